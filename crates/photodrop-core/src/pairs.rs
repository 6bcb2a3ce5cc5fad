use std::collections::BTreeMap;

use unicode_normalization::UnicodeNormalization;

use crate::media::{split_name, CaptureKind};

/// Paired captures found in one batch: base name -> number of files in that
/// stem that have an image/video partner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairReport {
    groups: BTreeMap<String, usize>,
}

impl PairReport {
    /// Number of paired captures (one per stem).
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of files that belong to some paired capture.
    pub fn paired_file_count(&self) -> usize {
        self.groups.values().sum()
    }

    pub fn groups(&self) -> &BTreeMap<String, usize> {
        &self.groups
    }

    pub fn is_paired(&self, filename: &str) -> bool {
        self.groups.contains_key(&normalized_stem(filename))
    }
}

/// Stem used for pairing. Phones may send the same name in NFD and NFC.
fn normalized_stem(filename: &str) -> String {
    split_name(filename).0.nfc().collect()
}

/// Find image+video captures sharing a base name.
///
/// A file is paired when another entry in the batch has the same base name and
/// the complementary kind (image vs. video). Stems with extra members still
/// count once, as long as at least one cross-kind match exists; only the
/// members that have a partner are counted in the group size.
pub fn detect_pairs<S: AsRef<str>>(filenames: &[S]) -> PairReport {
    // Group by stem first: O(n) instead of comparing every file with every other.
    let mut by_stem: BTreeMap<String, Vec<CaptureKind>> = BTreeMap::new();
    for name in filenames {
        let name = name.as_ref();
        by_stem
            .entry(normalized_stem(name))
            .or_default()
            .push(CaptureKind::from_name(name));
    }

    let mut groups = BTreeMap::new();
    for (stem, kinds) in by_stem {
        let has_image = kinds.contains(&CaptureKind::Image);
        let has_video = kinds.contains(&CaptureKind::Video);
        if !(has_image && has_video) {
            continue;
        }
        let members = kinds
            .iter()
            .filter(|k| matches!(k, CaptureKind::Image | CaptureKind::Video))
            .count();
        groups.insert(stem, members);
    }

    PairReport { groups }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pair() {
        let report = detect_pairs(&["IMG_0001.jpg", "IMG_0001.mov", "IMG_0002.jpg"]);
        assert_eq!(report.group_count(), 1);
        assert_eq!(report.paired_file_count(), 2);
        assert!(report.is_paired("IMG_0001.mov"));
        assert!(!report.is_paired("IMG_0002.jpg"));
    }

    #[test]
    fn test_lone_image_is_not_a_pair() {
        let report = detect_pairs(&["IMG_0002.jpg"]);
        assert_eq!(report.group_count(), 0);
        assert_eq!(report.paired_file_count(), 0);
    }

    #[test]
    fn test_extension_case_is_ignored() {
        let report = detect_pairs(&["IMG_7.HEIC", "IMG_7.MOV"]);
        assert_eq!(report.group_count(), 1);
    }

    #[test]
    fn test_same_kind_does_not_pair() {
        assert_eq!(detect_pairs(&["a.jpg", "a.heic"]).group_count(), 0);
        assert_eq!(detect_pairs(&["a.mov", "a.mp4"]).group_count(), 0);
        assert_eq!(detect_pairs(&["a.jpg", "a.png"]).group_count(), 0);
    }

    #[test]
    fn test_stem_is_case_sensitive() {
        assert_eq!(detect_pairs(&["img_1.jpg", "IMG_1.mov"]).group_count(), 0);
    }

    #[test]
    fn test_duplicate_entry_is_not_its_own_partner() {
        assert_eq!(detect_pairs(&["IMG_5.jpg", "IMG_5.jpg"]).group_count(), 0);
    }

    #[test]
    fn test_larger_stem_counts_partnered_members() {
        let report = detect_pairs(&["IMG_9.heic", "IMG_9.jpg", "IMG_9.mov", "IMG_9.aae"]);
        assert_eq!(report.group_count(), 1);
        assert_eq!(report.groups().get("IMG_9"), Some(&3));
    }

    #[test]
    fn test_nfd_and_nfc_names_pair() {
        let nfc = "caf\u{e9}.jpg";
        let nfd = "cafe\u{301}.mov";
        assert_eq!(detect_pairs(&[nfc, nfd]).group_count(), 1);
    }

    #[test]
    fn test_deterministic() {
        let names = ["b.jpg", "a.mov", "b.mp4", "a.heic", "c.jpg"];
        let first = detect_pairs(&names);
        for _ in 0..5 {
            assert_eq!(detect_pairs(&names), first);
        }
        let stems: Vec<&String> = first.groups().keys().collect();
        assert_eq!(stems, ["a", "b"]);
    }
}
