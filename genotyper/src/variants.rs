//! Variant calls from a pairwise alignment of a child stretch and a background path.
use crate::novel::NovelKmers;
use crate::stretch::Stretch;
use definitions::VariantCall;

pub const GAP: u8 = b'-';

pub trait Aligner: Send + Sync {
    /// Globally align `a` to `b`. The two returned strings have the same length, with gaps as `-`.
    fn align(&self, a: &str, b: &str) -> (String, String);
}

/// Global alignment by edlib.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdlibAligner;

// Edlib's operations: match, insertion (a base of the query), deletion (a base of the target), mismatch.
const EDLIB_MATCH: u8 = 0;
const EDLIB_INS: u8 = 1;
const EDLIB_DEL: u8 = 2;
const EDLIB_MISMATCH: u8 = 3;

impl Aligner for EdlibAligner {
    fn align(&self, a: &str, b: &str) -> (String, String) {
        let (query, target) = (a.as_bytes(), b.as_bytes());
        let ops = if query.is_empty() {
            vec![EDLIB_DEL; target.len()]
        } else if target.is_empty() {
            vec![EDLIB_INS; query.len()]
        } else {
            let mode = edlib_sys::AlignMode::Global;
            let task = edlib_sys::AlignTask::Alignment;
            let aln = edlib_sys::align(query, target, mode, task);
            aln.operations().map(|ops| ops.to_vec()).unwrap_or_default()
        };
        let (mut aln_a, mut aln_b) = (Vec::with_capacity(ops.len()), Vec::with_capacity(ops.len()));
        let (mut qpos, mut tpos) = (0, 0);
        for op in ops {
            match op {
                EDLIB_MATCH | EDLIB_MISMATCH => {
                    aln_a.push(query[qpos]);
                    aln_b.push(target[tpos]);
                    qpos += 1;
                    tpos += 1;
                }
                EDLIB_INS => {
                    aln_a.push(query[qpos]);
                    aln_b.push(GAP);
                    qpos += 1;
                }
                EDLIB_DEL => {
                    aln_a.push(GAP);
                    aln_b.push(target[tpos]);
                    tpos += 1;
                }
                _ => panic!("Unknown alignment operation:{}", op),
            }
        }
        assert_eq!(qpos, query.len(), "{}\n{}", a, b);
        assert_eq!(tpos, target.len(), "{}\n{}", a, b);
        let aln_a = String::from_utf8_lossy(&aln_a).to_string();
        let aln_b = String::from_utf8_lossy(&aln_b).to_string();
        (aln_a, aln_b)
    }
}

/// Maximal runs of disagreeing columns, with gaps stripped from the alleles.
/// Panics if the two strings have different lengths.
pub fn extract_variants(child_aln: &str, background_aln: &str) -> Vec<VariantCall> {
    assert_eq!(
        child_aln.len(),
        background_aln.len(),
        "Degenerate alignment\n{}\n{}",
        child_aln,
        background_aln
    );
    let mut calls = vec![];
    let (mut child_allele, mut background_allele) = (String::new(), String::new());
    let (mut pending, mut offset, mut child_pos) = (0, 0, 0);
    let columns = child_aln.bytes().zip(background_aln.bytes());
    for (column, (c, b)) in columns.enumerate() {
        if c.eq_ignore_ascii_case(&b) {
            if 0 < pending {
                let child = std::mem::take(&mut child_allele);
                let background = std::mem::take(&mut background_allele);
                calls.push(VariantCall::new(column - pending, offset, child, background));
                pending = 0;
            }
        } else {
            if pending == 0 {
                offset = child_pos;
            }
            pending += 1;
            if c != GAP {
                child_allele.push(c as char);
            }
            if b != GAP {
                background_allele.push(b as char);
            }
        }
        if c != GAP {
            child_pos += 1;
        }
    }
    if 0 < pending {
        let column = child_aln.len() - pending;
        calls.push(VariantCall::new(column, offset, child_allele, background_allele));
    }
    calls
}

/// Attach the novel k-mers of the stretch overlapping the child allele.
/// `call.offset` should be an offset into the stretch.
pub fn annotate_novel_kmers(call: &mut VariantCall, stretch: &Stretch, novel: &NovelKmers) {
    let k = stretch.k();
    // A deletion lies between two bases of the child.
    let start = match call.child_allele.is_empty() {
        true => call.offset.saturating_sub(1),
        false => call.offset,
    };
    let end = call.offset + call.child_allele.len().max(1);
    call.novel_kmers = stretch
        .kmers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i < end && start < i + k)
        .filter(|(_, kmer)| novel.contains(kmer))
        .map(|(_, kmer)| kmer.clone())
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn identical() {
        assert!(extract_variants("ACGTACGT", "ACGTACGT").is_empty());
        assert!(extract_variants("", "").is_empty());
    }
    #[test]
    fn single_run() {
        let calls = extract_variants("ACGTTACG", "ACGC-ACG");
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!((call.column, call.offset), (3, 3));
        assert_eq!(call.child_allele, "TT");
        assert_eq!(call.background_allele, "C");
        assert_eq!(call.child_allele.len() + call.background_allele.len(), 3);
    }
    #[test]
    fn runs_and_flush() {
        let calls = extract_variants("AC-TG", "ACATC");
        assert_eq!(calls.len(), 2);
        assert_eq!((calls[0].column, calls[0].offset), (2, 2));
        assert_eq!(calls[0].child_allele, "");
        assert_eq!(calls[0].background_allele, "A");
        assert!(calls[0].is_indel());
        assert_eq!((calls[1].column, calls[1].offset), (4, 3));
        assert!(calls[1].is_snv());
    }
    #[test]
    #[should_panic]
    fn unequal_length() {
        extract_variants("ACGT", "ACG");
    }
    #[test]
    fn edlib() {
        let aligner = EdlibAligner;
        let (a, b) = aligner.align("ACGTACGT", "ACGAACGT");
        assert_eq!((a.as_str(), b.as_str()), ("ACGTACGT", "ACGAACGT"));
        let (a, b) = aligner.align("ACGTTACGGA", "ACGTACGGA");
        assert_eq!(a.len(), b.len());
        assert_eq!(a.replace('-', ""), "ACGTTACGGA");
        assert_eq!(b.replace('-', ""), "ACGTACGGA");
        let calls = extract_variants(&a, &b);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].child_allele, "T");
        assert!(calls[0].background_allele.is_empty());
        let (a, b) = aligner.align("", "ACG");
        assert_eq!((a.as_str(), b.as_str()), ("---", "ACG"));
    }
    #[test]
    fn novel_kmers_of_call() {
        let kmers = crate::kmer::kmers("ACGGTATCC", 3);
        let novel = NovelKmers::new(vec!["GTA".to_string(), "TAT".to_string()]);
        let is_novel = kmers.iter().map(|k| novel.contains(k)).collect();
        let stretch = Stretch {
            kmers,
            novel: is_novel,
        };
        // A substitution at the 5-th base (A).
        let mut call = VariantCall::new(5, 5, "A".to_string(), "C".to_string());
        annotate_novel_kmers(&mut call, &stretch, &novel);
        assert_eq!(call.novel_kmers, vec!["GTA".to_string(), "TAT".to_string()]);
    }
}
