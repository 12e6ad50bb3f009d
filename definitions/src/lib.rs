//! Definitions -- A tiny interface for genotyping novel sequence in a colored de Bruijn graph.
//! The other crates in this workspace pass messages, or interact with other CLI via JSON object format.
//! The records read from a graph source are [KmerRecord](KmerRecord), and the result of
//! genotyping one assembled stretch is a [StretchReport](StretchReport).

use serde::{Deserialize, Serialize};

/// Nucleotides in the order used by adjacency masks.
pub const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// A k-mer read from a graph source.
/// The k-mer is stored in its canonical orientation (the lexicographically smaller
/// of itself and its reverse complement), and all the adjacency masks are relative
/// to this orientation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KmerRecord {
    /// Canonical k-mer. A string on the alphabet of A,C,G,T.
    pub kmer: String,
    /// Coverage of the k-mer. The i-th element is the coverage in the i-th color.
    pub coverages: Vec<u32>,
    /// Adjacency mask of each color.
    /// The lower four bits are outgoing A,C,G,T, the higher four bits are incoming A,C,G,T.
    pub edges: Vec<u8>,
}

impl KmerRecord {
    pub fn new(kmer: String, num_colors: usize) -> Self {
        Self {
            kmer,
            coverages: vec![0; num_colors],
            edges: vec![0; num_colors],
        }
    }
    pub fn kmer(&self) -> &[u8] {
        self.kmer.as_bytes()
    }
    pub fn num_colors(&self) -> usize {
        self.coverages.len()
    }
    /// Coverage in the given color. Out-of-range colors have zero coverage.
    pub fn coverage(&self, color: usize) -> u32 {
        self.coverages.get(color).copied().unwrap_or(0)
    }
    pub fn has_coverage(&self, color: usize) -> bool {
        0 < self.coverage(color)
    }
    pub fn edges(&self, color: usize) -> u8 {
        self.edges.get(color).copied().unwrap_or(0)
    }
    /// Outgoing bases of the canonical k-mer in the given color.
    pub fn outgoing(&self, color: usize) -> Vec<u8> {
        let mask = self.edges(color);
        BASES
            .iter()
            .enumerate()
            .filter(|&(i, _)| mask & (1 << i) != 0)
            .map(|(_, &b)| b)
            .collect()
    }
    /// Incoming bases of the canonical k-mer in the given color.
    pub fn incoming(&self, color: usize) -> Vec<u8> {
        let mask = self.edges(color);
        BASES
            .iter()
            .enumerate()
            .filter(|&(i, _)| mask & (1 << (i + 4)) != 0)
            .map(|(_, &b)| b)
            .collect()
    }
}

impl std::fmt::Display for KmerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let colors: Vec<_> = self
            .coverages
            .iter()
            .zip(self.edges.iter())
            .map(|(cov, edge)| format!("{}:{:08b}", cov, edge))
            .collect();
        write!(f, "{}\t{}", self.kmer, colors.join(","))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let x = match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        };
        write!(f, "{}", x)
    }
}

/// A region on a reference or parental contig. Both ends are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenomicInterval {
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

impl GenomicInterval {
    pub fn new(contig: &str, start: u64, end: u64, strand: Strand) -> Self {
        assert!(start <= end, "{}:{}-{}", contig, start, end);
        Self {
            contig: contig.to_string(),
            start,
            end,
            strand,
        }
    }
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
    /// Return true if the two intervals are on the same contig and strand,
    /// and they overlap after extending both of them by `window` bases.
    pub fn is_near(&self, other: &Self, window: u64) -> bool {
        self.contig == other.contig
            && self.strand == other.strand
            && self.start <= other.end.saturating_add(window)
            && other.start <= self.end.saturating_add(window)
    }
    /// The smallest interval containing both. Panics if they are on different contigs.
    pub fn union(&self, other: &Self) -> Self {
        assert_eq!(self.contig, other.contig);
        assert_eq!(self.strand, other.strand);
        Self {
            contig: self.contig.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            strand: self.strand,
        }
    }
}

impl std::fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.contig, self.start, self.end, self.strand
        )
    }
}

/// A discrete allele call between a child stretch and one background path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VariantCall {
    /// Name of the background (parent or reference) the child was aligned to.
    pub background: String,
    /// 0-index. The column of the alignment where the mismatch run starts.
    pub column: usize,
    /// 0-index. Offset into the child stretch.
    pub offset: usize,
    /// Child allele. No gap characters.
    pub child_allele: String,
    /// Background allele. No gap characters.
    pub background_allele: String,
    /// Novel k-mers of the child stretch spanning this call.
    pub novel_kmers: Vec<String>,
}

impl VariantCall {
    pub fn new(column: usize, offset: usize, child_allele: String, background_allele: String) -> Self {
        Self {
            background: String::new(),
            column,
            offset,
            child_allele,
            background_allele,
            novel_kmers: vec![],
        }
    }
    pub fn is_snv(&self) -> bool {
        self.child_allele.len() == 1 && self.background_allele.len() == 1
    }
    pub fn is_indel(&self) -> bool {
        self.child_allele.len() != self.background_allele.len()
    }
}

impl std::fmt::Display for VariantCall {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let child = if self.child_allele.is_empty() {
            "-"
        } else {
            self.child_allele.as_str()
        };
        let background = if self.background_allele.is_empty() {
            "-"
        } else {
            self.background_allele.as_str()
        };
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.background,
            self.offset,
            child,
            background,
            self.novel_kmers.len()
        )
    }
}

/// The labels assigned to each position of a stretch for one background group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BackgroundLabels {
    /// Name of the group, e.g., "parents" or "references".
    pub group: String,
    /// The i-th element is the label of the i-th k-mer of the stretch.
    pub labels: Vec<String>,
}

/// Genotyping result of one assembled stretch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StretchReport {
    /// The novel k-mer the stretch was assembled from.
    pub seed: String,
    /// Id of the worker which claimed the stretch.
    pub owner: usize,
    /// The sequence of the stretch.
    pub stretch: String,
    /// Number of novel k-mers claimed by this stretch.
    pub novel_kmers: usize,
    /// Number of unitigs in the local subgraph.
    pub unitigs: usize,
    pub labels: Vec<BackgroundLabels>,
    pub variants: Vec<VariantCall>,
}

impl std::fmt::Display for StretchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.seed,
            self.owner,
            self.stretch.len(),
            self.novel_kmers,
            self.unitigs
        )?;
        let lines: Vec<_> = self.variants.iter().map(|v| format!("{}", v)).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn adjacency_mask() {
        let mut record = KmerRecord::new("ACG".to_string(), 2);
        record.edges[1] = 0b0010_0101;
        assert_eq!(record.outgoing(1), b"AG".to_vec());
        assert_eq!(record.incoming(1), b"C".to_vec());
        assert!(record.outgoing(0).is_empty());
        assert!(record.outgoing(5).is_empty());
        assert_eq!(record.coverage(5), 0);
    }
    #[test]
    fn interval_nearness() {
        let a = GenomicInterval::new("chr1", 100, 150, Strand::Forward);
        let b = GenomicInterval::new("chr1", 160, 200, Strand::Forward);
        let c = GenomicInterval::new("chr1", 160, 200, Strand::Reverse);
        assert!(!a.is_near(&b, 0));
        assert!(a.is_near(&b, 10));
        assert!(!a.is_near(&c, 100));
        let u = a.union(&b);
        assert_eq!((u.start, u.end), (100, 200));
        assert_eq!(format!("{}", u), "chr1:100-200:+");
    }
    #[test]
    fn report_json() {
        let mut call = VariantCall::new(3, 3, "A".to_string(), "".to_string());
        call.background = "mother".to_string();
        let report = StretchReport {
            seed: "ACGTA".to_string(),
            variants: vec![call],
            ..Default::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: StretchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
        assert!(back.variants[0].is_indel());
    }
}
