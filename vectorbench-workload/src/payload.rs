//! Random vectors and the request body fragments wrapping them.

use rand::Rng;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

/// Generates a vector of `dims` values drawn uniformly from `[0, 1)`.
pub fn random_vector<R: Rng + ?Sized>(rng: &mut R, dims: usize) -> Vec<f32> {
    (0..dims).map(|_| rng.random::<f32>()).collect()
}

/// Builds a nearest-neighbor query body searching `field` for the `k` closest matches.
///
/// ```json
/// {"query": {"knn": {"<field>": {"vector": [...], "k": 100}}}}
/// ```
pub fn knn_query(field: &str, vector: Vec<f32>, k: u32) -> Map<String, Value> {
    let mut knn = Map::new();
    knn.insert(field.to_owned(), json!({ "vector": vector, "k": k }));

    let mut body = Map::new();
    body.insert("query".to_owned(), json!({ "knn": knn }));
    body
}

/// Shallow merge of `overrides` into `base`; keys from `overrides` win.
pub fn merge_body(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        base.insert(key.clone(), value.clone());
    }
}

/// The bulk action used for a document.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BulkAction {
    /// Index the document, overwriting an existing one with the same id.
    Index,
    /// Create the document, failing if it already exists.
    Create,
}

impl BulkAction {
    /// The action keyword in the bulk header.
    pub fn as_str(self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Create => "create",
        }
    }
}

/// A generated document carrying one vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Random tag used by partition-aware filtering, if any.
    pub partition_id: Option<u32>,
    /// Name of the vector field.
    pub field: String,
    /// The vector itself.
    pub vector: Vec<f32>,
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.partition_id.is_some() { 2 } else { 1 };
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(partition_id) = self.partition_id {
            map.serialize_entry("partition_id", &partition_id)?;
        }
        map.serialize_entry(&self.field, &self.vector)?;
        map.end()
    }
}

/// One entry of a bulk request: the action header and the document it applies to.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkRecord {
    /// Action named in the header.
    pub action: BulkAction,
    /// Index named in the header.
    pub index: String,
    /// The document body.
    pub document: Document,
}

impl BulkRecord {
    /// The action header, e.g. `{"create": {"_index": "target_index"}}`.
    pub fn header(&self) -> Value {
        let mut header = Map::new();
        header.insert(
            self.action.as_str().to_owned(),
            json!({ "_index": self.index }),
        );
        Value::Object(header)
    }
}

/// Serializes records as the flat, alternating header/document list of a bulk body.
pub(crate) fn serialize_records<S: Serializer>(
    records: &[BulkRecord],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(records.len() * 2))?;
    for record in records {
        seq.serialize_element(&record.header())?;
        seq.serialize_element(&record.document)?;
    }
    seq.end()
}
