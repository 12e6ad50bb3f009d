//! Small functions on k-mers: reverse complement, canonical form, and the low-complexity filter.

// Period p is tested only when the k-mer holds at least this many copies of the unit.
const MIN_REPEAT_UNITS: usize = 3;
const MAX_PERIOD: usize = 2;

pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        _ => b'N',
    }
}

pub fn revcmp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

pub fn revcmp_str(seq: &str) -> String {
    String::from_utf8(revcmp(seq.as_bytes())).unwrap_or_default()
}

/// Return the lexicographically smaller of the k-mer and its reverse complement.
pub fn canonical(kmer: &str) -> String {
    let rev = revcmp_str(kmer);
    if rev.as_str() < kmer {
        rev
    } else {
        kmer.to_string()
    }
}

pub fn is_canonical(kmer: &str) -> bool {
    kmer <= revcmp_str(kmer).as_str()
}

pub fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

pub fn is_valid(kmer: &str) -> bool {
    !kmer.is_empty() && kmer.bytes().all(|b| base_index(b).is_some())
}

/// A k-mer is low-complexity if it is a tandem repeat of a unit of
/// length at most two (homopolymers and dinucleotide repeats).
pub fn is_low_complexity(kmer: &str) -> bool {
    let kmer = kmer.as_bytes();
    (1..=MAX_PERIOD)
        .filter(|&period| period * MIN_REPEAT_UNITS <= kmer.len())
        .any(|period| kmer.iter().zip(kmer.iter().skip(period)).all(|(x, y)| x == y))
}

/// All the k-mers of `seq`, in order.
pub fn kmers(seq: &str, k: usize) -> Vec<String> {
    if k == 0 || seq.len() < k {
        return vec![];
    }
    seq.as_bytes()
        .windows(k)
        .map(|w| String::from_utf8_lossy(w).to_string())
        .collect()
}

/// The k-mer following `kmer` by appending `base`.
pub fn next_kmer(kmer: &str, base: u8) -> String {
    let mut next = kmer[1..].to_string();
    next.push(base as char);
    next
}

/// The k-mer preceding `kmer` by prepending `base`.
pub fn prev_kmer(kmer: &str, base: u8) -> String {
    let mut prev = String::with_capacity(kmer.len());
    prev.push(base as char);
    prev.push_str(&kmer[..kmer.len() - 1]);
    prev
}

/// Spell the sequence of a path of overlapping sequences,
/// each consecutive pair sharing `k-1` bases.
pub fn spell<S: AsRef<str>>(path: &[S], k: usize) -> String {
    let mut seq = String::new();
    for (idx, s) in path.iter().enumerate() {
        let s = s.as_ref();
        if idx == 0 {
            seq.push_str(s);
        } else {
            seq.push_str(&s[k - 1..]);
        }
    }
    seq
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn revcmp_test() {
        assert_eq!(revcmp_str("ACGTT"), "AACGT");
        assert_eq!(revcmp_str(""), "");
        assert_eq!(canonical("TGC"), "GCA");
        assert_eq!(canonical("ATG"), "ATG");
        assert!(is_canonical("ATG"));
        assert!(!is_canonical("TGC"));
        assert!(is_canonical("ACGT"));
    }
    #[test]
    fn low_complexity() {
        assert!(is_low_complexity("AAAAAAA"));
        assert!(is_low_complexity("ACACACAC"));
        assert!(!is_low_complexity("ATG"));
        assert!(!is_low_complexity("ATA"));
        assert!(!is_low_complexity("ACGTACGTAC"));
        assert!(is_low_complexity("CCC"));
    }
    #[test]
    fn windows() {
        let ks = kmers("ACGTA", 3);
        assert_eq!(ks, vec!["ACG", "CGT", "GTA"]);
        assert!(kmers("AC", 3).is_empty());
        assert_eq!(spell(&ks, 3), "ACGTA");
        assert_eq!(next_kmer("ACG", b'T'), "CGT");
        assert_eq!(prev_kmer("CGT", b'A'), "ACG");
    }
}
