//! Typed records for every collection.
//!
//! Each collection has exactly one record shape. Payloads are decoded with
//! `deny_unknown_fields`, so a body that does not match the schema of its
//! collection is rejected instead of being stored untyped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::StoreError;

/// Named collections known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Documents,
    Images,
    Farmacias,
    Medicamentos,
    Clientes,
    Proveedores,
    Doctores,
    Citas,
    Transacciones,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Documents,
        Collection::Images,
        Collection::Farmacias,
        Collection::Medicamentos,
        Collection::Clientes,
        Collection::Proveedores,
        Collection::Doctores,
        Collection::Citas,
        Collection::Transacciones,
    ];

    /// Table / route name of the collection.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Documents => "documents",
            Collection::Images => "images",
            Collection::Farmacias => "farmacias",
            Collection::Medicamentos => "medicamentos",
            Collection::Clientes => "clientes",
            Collection::Proveedores => "proveedores",
            Collection::Doctores => "doctores",
            Collection::Citas => "citas",
            Collection::Transacciones => "transacciones",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}

/// Language tag of a text document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

/// Retrievable text unit. The only search-eligible record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextDocument {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_medicamento: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Identifiers of linked records in `images`.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Null until the backfill job attaches a vector.
    #[serde(default)]
    pub embeddings: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingest_ts: Option<DateTime<Utc>>,
}

impl TextDocument {
    /// Minimal document without embedding.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            doc_type: None,
            title: title.into(),
            content: content.into(),
            language: Language::default(),
            related_medicamento: None,
            tags: Vec::new(),
            images: Vec::new(),
            metadata: Map::new(),
            embeddings: None,
            embedding_model: None,
            ingest_ts: None,
        }
    }

    /// True when the document carries a vector and can be scored.
    pub fn is_embedded(&self) -> bool {
        self.embeddings.is_some()
    }

    /// Attach a vector together with the model tag that produced it.
    pub fn with_embedding(mut self, vector: Vec<f32>, model: impl Into<String>) -> Self {
        self.embeddings = Some(vector);
        self.embedding_model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Media reference; images are stored but not searched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageAsset {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub filename: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_med_id: Option<String>,
    #[serde(default)]
    pub embeddings: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Farmacia {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub ciudad: String,
    pub direccion: String,
    pub telefono: String,
    #[serde(default)]
    pub empleados: Vec<String>,
    /// Identifiers of stocked medicamentos.
    #[serde(default)]
    pub medicamentos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Categoria {
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Medicamento {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub nombre: String,
    pub precio: f64,
    pub categoria: Categoria,
    #[serde(default)]
    pub proveedores: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cliente {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub nombre: String,
    pub direccion: String,
    pub telefono: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Proveedor {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub nombre: String,
    pub telefono: String,
    pub direccion: String,
    pub ciudad: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Doctor {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub nombre: String,
    pub apellido: String,
    pub especialidad: String,
    pub telefono: String,
}

/// Denormalized pointer to another record (`{ "_id", "nombre" }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cita {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub fecha: DateTime<Utc>,
    pub cliente: EntityRef,
    pub doctor: EntityRef,
    /// Prescribed medicamento identifiers.
    #[serde(default)]
    pub receta: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaccion {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub fecha: DateTime<Utc>,
    pub totalpagado: f64,
    pub metodopago: String,
    #[serde(default)]
    pub empleado: Vec<String>,
    #[serde(default)]
    pub citaref: Option<String>,
}

/// One record of any collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Document(TextDocument),
    Image(ImageAsset),
    Farmacia(Farmacia),
    Medicamento(Medicamento),
    Cliente(Cliente),
    Proveedor(Proveedor),
    Doctor(Doctor),
    Cita(Cita),
    Transaccion(Transaccion),
}

macro_rules! each_entity {
    ($value:expr, $rec:ident => $body:expr) => {
        match $value {
            Entity::Document($rec) => $body,
            Entity::Image($rec) => $body,
            Entity::Farmacia($rec) => $body,
            Entity::Medicamento($rec) => $body,
            Entity::Cliente($rec) => $body,
            Entity::Proveedor($rec) => $body,
            Entity::Doctor($rec) => $body,
            Entity::Cita($rec) => $body,
            Entity::Transaccion($rec) => $body,
        }
    };
}

impl Entity {
    /// Decode a JSON payload with the schema of `collection`.
    pub fn from_value(collection: Collection, value: Value) -> Result<Self, StoreError> {
        let schema_err = |e: serde_json::Error| StoreError::Schema {
            collection,
            reason: e.to_string(),
        };
        let entity = match collection {
            Collection::Documents => Entity::Document(serde_json::from_value(value).map_err(schema_err)?),
            Collection::Images => Entity::Image(serde_json::from_value(value).map_err(schema_err)?),
            Collection::Farmacias => Entity::Farmacia(serde_json::from_value(value).map_err(schema_err)?),
            Collection::Medicamentos => {
                Entity::Medicamento(serde_json::from_value(value).map_err(schema_err)?)
            }
            Collection::Clientes => Entity::Cliente(serde_json::from_value(value).map_err(schema_err)?),
            Collection::Proveedores => {
                Entity::Proveedor(serde_json::from_value(value).map_err(schema_err)?)
            }
            Collection::Doctores => Entity::Doctor(serde_json::from_value(value).map_err(schema_err)?),
            Collection::Citas => Entity::Cita(serde_json::from_value(value).map_err(schema_err)?),
            Collection::Transacciones => {
                Entity::Transaccion(serde_json::from_value(value).map_err(schema_err)?)
            }
        };
        Ok(entity)
    }

    /// Decode stored JSON bytes with the schema of `collection`.
    pub(crate) fn from_slice(collection: Collection, bytes: &[u8]) -> Result<Self, StoreError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
        Entity::from_value(collection, value).map_err(|e| StoreError::Decode(e.to_string()))
    }

    pub fn collection(&self) -> Collection {
        match self {
            Entity::Document(_) => Collection::Documents,
            Entity::Image(_) => Collection::Images,
            Entity::Farmacia(_) => Collection::Farmacias,
            Entity::Medicamento(_) => Collection::Medicamentos,
            Entity::Cliente(_) => Collection::Clientes,
            Entity::Proveedor(_) => Collection::Proveedores,
            Entity::Doctor(_) => Collection::Doctores,
            Entity::Cita(_) => Collection::Citas,
            Entity::Transaccion(_) => Collection::Transacciones,
        }
    }

    pub fn id(&self) -> &str {
        each_entity!(self, rec => rec.id.as_str())
    }

    pub fn set_id(&mut self, id: String) {
        each_entity!(self, rec => rec.id = id)
    }

    pub fn as_document(&self) -> Option<&TextDocument> {
        match self {
            Entity::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<TextDocument> {
        match self {
            Entity::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Check the invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), StoreError> {
        let collection = self.collection();
        let invalid = |reason: String| StoreError::Schema { collection, reason };
        match self {
            Entity::Document(doc) => {
                check_embedding(doc.embeddings.as_deref(), doc.embedding_model.as_deref())
                    .map_err(invalid)
            }
            Entity::Image(img) => {
                check_embedding(img.embeddings.as_deref(), img.embedding_model.as_deref())
                    .map_err(invalid)
            }
            Entity::Medicamento(med) => check_amount("precio", med.precio).map_err(invalid),
            Entity::Transaccion(tx) => check_amount("totalpagado", tx.totalpagado).map_err(invalid),
            _ => Ok(()),
        }
    }

    pub fn to_value(&self) -> Result<Value, StoreError> {
        serde_json::to_value(self).map_err(|e| StoreError::Encode(e.to_string()))
    }
}

impl From<TextDocument> for Entity {
    fn from(doc: TextDocument) -> Self {
        Entity::Document(doc)
    }
}

/// A vector and its model tag are written together or not at all.
fn check_embedding(vector: Option<&[f32]>, model: Option<&str>) -> Result<(), String> {
    match (vector, model) {
        (None, None) => Ok(()),
        (Some(v), Some(m)) => {
            if v.is_empty() {
                return Err("embeddings must not be empty".into());
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err("embeddings must contain only finite values".into());
            }
            if m.trim().is_empty() {
                return Err("embedding_model must not be blank".into());
            }
            Ok(())
        }
        (Some(_), None) => Err("embeddings present without embedding_model".into()),
        (None, Some(_)) => Err("embedding_model present without embeddings".into()),
    }
}

fn check_amount(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{field} must be a finite, non-negative number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collection_names_roundtrip() {
        for c in Collection::ALL {
            assert_eq!(c.name().parse::<Collection>().unwrap(), c);
        }
        assert!(matches!(
            "employees".parse::<Collection>(),
            Err(StoreError::UnknownCollection(_))
        ));
    }

    #[test]
    fn document_defaults_apply() {
        let e = Entity::from_value(
            Collection::Documents,
            json!({ "title": "Guía de uso", "content": "Lea el prospecto" }),
        )
        .unwrap();
        let doc = e.as_document().unwrap();
        assert_eq!(doc.language, Language::Es);
        assert!(doc.embeddings.is_none());
        assert!(doc.id.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Entity::from_value(
            Collection::Clientes,
            json!({ "nombre": "Ana", "direccion": "Calle 1", "telefono": "555", "edad": 3 }),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Schema { collection: Collection::Clientes, .. }));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = Entity::from_value(
            Collection::Doctores,
            json!({ "nombre": "Luis", "apellido": "Pérez", "telefono": "1" }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("especialidad"));
    }

    #[test]
    fn unknown_language_is_rejected() {
        let res = Entity::from_value(
            Collection::Documents,
            json!({ "title": "t", "content": "c", "language": "fr" }),
        );
        assert!(res.is_err());
    }

    #[test]
    fn embedding_without_model_fails_validation() {
        let e = Entity::from_value(
            Collection::Documents,
            json!({ "title": "t", "content": "c", "embeddings": [0.1, 0.2] }),
        )
        .unwrap();
        assert!(e.validate().is_err());

        let ok = Entity::Document(TextDocument::new("t", "c").with_embedding(vec![0.1], "m"));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn negative_price_fails_validation() {
        let e = Entity::from_value(
            Collection::Medicamentos,
            json!({ "nombre": "Ibuprofeno", "precio": -1.0, "categoria": { "nombre": "Analgesicos" } }),
        )
        .unwrap();
        assert!(e.validate().is_err());
    }

    #[test]
    fn cita_requires_rfc3339_date() {
        let good = json!({
            "fecha": "2024-03-01T10:00:00Z",
            "cliente": { "_id": "c1" },
            "doctor": { "_id": "d1", "nombre": "Dra. Ruiz" }
        });
        assert!(Entity::from_value(Collection::Citas, good).is_ok());

        let bad = json!({ "fecha": "ayer", "cliente": { "_id": "c1" }, "doctor": { "_id": "d1" } });
        assert!(Entity::from_value(Collection::Citas, bad).is_err());
    }

    #[test]
    fn set_id_and_serialize_as_underscore_id() {
        let mut e = Entity::Document(TextDocument::new("t", "c"));
        e.set_id("abc".into());
        assert_eq!(e.id(), "abc");
        let v = e.to_value().unwrap();
        assert_eq!(v["_id"], "abc");
        assert!(v["embeddings"].is_null());
    }
}
