//! Files picked for upload, each with an inline preview.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use b2b_core::detect_content_type;

/// A file as handed over by the picker: name, claimed media type, bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Media type the blob is stored under.
    pub fn stored_content_type(&self) -> String {
        detect_content_type(&self.name, &self.data, &self.content_type)
    }
}

/// Handle for removing one selected file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionId(u64);

/// Inline preview shown before upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub id: SelectionId,
    pub name: String,
    /// `data:{mime};base64,...`
    pub data_url: String,
}

#[derive(Debug, Clone)]
struct Entry {
    id: SelectionId,
    file: SelectedFile,
    data_url: String,
}

/// Ordered pending uploads. Upload results keep this order.
#[derive(Debug, Clone, Default)]
pub struct FileSelection {
    next_id: u64,
    entries: Vec<Entry>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file and build its preview.
    pub fn add(&mut self, file: SelectedFile) -> SelectionId {
        let id = SelectionId(self.next_id);
        self.next_id += 1;
        let data_url = preview_data_url(&file.stored_content_type(), &file.data);
        self.entries.push(Entry { id, file, data_url });
        id
    }

    /// Drop a file together with its preview.
    pub fn remove_selected(&mut self, id: SelectionId) -> Option<SelectedFile> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index).file)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.file.size()).sum()
    }

    /// Files in selection order.
    pub fn files(&self) -> impl Iterator<Item = &SelectedFile> {
        self.entries.iter().map(|e| &e.file)
    }

    pub fn previews(&self) -> Vec<Preview> {
        self.entries
            .iter()
            .map(|e| Preview {
                id: e.id,
                name: e.file.name.clone(),
                data_url: e.data_url.clone(),
            })
            .collect()
    }
}

/// Inline `data:` URL for bytes of the given media type.
pub fn preview_data_url(content_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_preview_data_url() {
        assert_eq!(preview_data_url("image/png", b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_add_builds_preview_from_sniffed_type() {
        let mut selection = FileSelection::new();
        let id = selection.add(SelectedFile::new("photo", "", PNG.to_vec()));
        let previews = selection.previews();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].id, id);
        assert!(previews[0].data_url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_remove_selected_drops_preview_and_upload() {
        let mut selection = FileSelection::new();
        let a = selection.add(SelectedFile::new("a.png", "image/png", PNG.to_vec()));
        let b = selection.add(SelectedFile::new("b.png", "image/png", vec![0; 10]));
        let c = selection.add(SelectedFile::new("c.png", "image/png", PNG.to_vec()));

        let removed = selection.remove_selected(b).unwrap();
        assert_eq!(removed.name, "b.png");
        assert!(selection.remove_selected(b).is_none());

        let names: Vec<_> = selection.files().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        let ids: Vec<_> = selection.previews().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(selection.total_bytes(), 2 * PNG.len() as u64);
    }

    #[test]
    fn test_ids_not_reused_after_clear() {
        let mut selection = FileSelection::new();
        let first = selection.add(SelectedFile::new("a.png", "image/png", PNG.to_vec()));
        selection.clear();
        assert!(selection.is_empty());
        let second = selection.add(SelectedFile::new("a.png", "image/png", PNG.to_vec()));
        assert_ne!(first, second);
    }
}
