use std::collections::BTreeSet;

/// File ids known to one node. Both sets only grow.
#[derive(Debug, Default, Clone)]
pub struct FileDirectory {
    files: BTreeSet<u64>,
    local_files: BTreeSet<u64>,
}

impl FileDirectory {
    pub fn new() -> Self {
        FileDirectory::default()
    }

    /// Records a file this node is authoritative for. Returns false when it
    /// was already present.
    pub fn store(&mut self, file_id: u64) -> bool {
        self.files.insert(file_id)
    }

    /// Remembers a file located on another node.
    pub fn cache(&mut self, file_id: u64) -> bool {
        self.local_files.insert(file_id)
    }

    pub fn owns(&self, file_id: u64) -> bool {
        self.files.contains(&file_id)
    }

    pub fn files(&self) -> Vec<u64> {
        self.files.iter().copied().collect()
    }

    pub fn local_files(&self) -> Vec<u64> {
        self.local_files.iter().copied().collect()
    }
}
