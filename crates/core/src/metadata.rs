use crate::models::MetadataRecord;

/// Records addressed by index position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<MetadataRecord>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_records(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    pub(crate) fn push(&mut self, record: MetadataRecord) {
        self.records.push(record);
    }

    pub fn record_at(&self, position: usize) -> Option<&MetadataRecord> {
        self.records.get(position)
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
