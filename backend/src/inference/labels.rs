use std::fs;
use std::path::Path;

use super::model::ClassifierError;

/// Class descriptions indexed by the model's output position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let text = fs::read_to_string(path).map_err(|source| ClassifierError::Labels {
            path: path.to_path_buf(),
            source,
        })?;
        let labels = Self::parse(&text);
        if labels.is_empty() {
            return Err(ClassifierError::EmptyLabels(path.to_path_buf()));
        }
        log::debug!("Loaded {} class labels from {}", labels.len(), path.display());
        Ok(labels)
    }

    /// One label per line; ImageNet synset ids such as `n01440764 ` are dropped.
    pub fn parse(text: &str) -> Self {
        let mut labels: Vec<String> = text
            .lines()
            .map(|line| strip_synset(line.trim()).to_string())
            .collect();
        while labels.last().is_some_and(|l| l.is_empty()) {
            labels.pop();
        }
        Self { labels }
    }

    pub fn get(&self, class_index: usize) -> Option<&str> {
        self.labels.get(class_index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn strip_synset(line: &str) -> &str {
    let bytes = line.as_bytes();
    let is_synset = bytes.len() > 10
        && bytes[0] == b'n'
        && bytes[1..9].iter().all(u8::is_ascii_digit)
        && bytes[9] == b' ';
    if is_synset { line[10..].trim_start() } else { line }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_labels() {
        let labels = ClassLabels::parse("apple\nbanana\r\n  carrot \n\n\n");
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(0), Some("apple"));
        assert_eq!(labels.get(2), Some("carrot"));
        assert_eq!(labels.get(3), None);
    }

    #[test]
    fn strips_imagenet_synsets() {
        let labels = ClassLabels::parse("n01440764 tench, Tinca tinca\nn02123045 tabby, tabby cat\n");
        assert_eq!(labels.get(0), Some("tench, Tinca tinca"));
        assert_eq!(labels.get(1), Some("tabby, tabby cat"));
    }

    #[test]
    fn keeps_blank_lines_between_labels() {
        let labels = ClassLabels::parse("apple\n\nbanana\n");
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(1), Some(""));
        assert_eq!(labels.get(2), Some("banana"));
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "\n\n").unwrap();
        assert!(matches!(
            ClassLabels::load(&path),
            Err(ClassifierError::EmptyLabels(_))
        ));
    }
}
