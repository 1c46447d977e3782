//! Synthetic dataset for seeding the store.
//!
//! Generation is a pure function of [`DatasetConfig`] and the `now`
//! timestamp: the same seed always yields the same records, identifiers
//! included.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use store::{
    Categoria, Cita, Cliente, Collection, Doctor, Entity, EntityRef, Farmacia, ImageAsset,
    ImageMetadata, Language, Medicamento, Proveedor, TextDocument, Transaccion,
};
use thiserror::Error;

/// Days from the Unix epoch to 2019-01-01.
const DATE_RANGE_START_DAYS: i64 = 17_897;
/// Days from 2019-01-01 to 2025-12-31.
const DATE_RANGE_SPAN_DAYS: i64 = 2_556;

const TOPICS: [&str; 9] = [
    "Analgesicos",
    "Antibioticos",
    "Antiinflamatorios",
    "Antihistaminicos",
    "Dermatologicos",
    "Cardiologicos",
    "Gastrointestinales",
    "Vitaminas",
    "Respiratorios",
];

const PRINCIPIOS: [&str; 16] = [
    "Paracetamol",
    "Ibuprofeno",
    "Amoxicilina",
    "Omeprazol",
    "Loratadina",
    "Cetirizina",
    "Salbutamol",
    "Enalapril",
    "Atorvastatina",
    "Metformina",
    "Diclofenaco",
    "Naproxeno",
    "Azitromicina",
    "Hidrocortisona",
    "Vitamina C",
    "Ranitidina",
];

const PRESENTACIONES: [&str; 6] = [
    "500mg tabletas",
    "400mg comprimidos",
    "250mg capsulas",
    "jarabe 120ml",
    "crema 30g",
    "inhalador 100mcg",
];

const NOMBRES: [&str; 16] = [
    "Ana", "Luis", "Maria", "Jorge", "Lucia", "Carlos", "Sofia", "Miguel", "Elena", "Pablo",
    "Carmen", "Diego", "Laura", "Andres", "Paula", "Javier",
];

const APELLIDOS: [&str; 12] = [
    "Garcia", "Rodriguez", "Martinez", "Lopez", "Sanchez", "Perez", "Gomez", "Fernandez",
    "Diaz", "Torres", "Ramirez", "Morales",
];

const CIUDADES: [&str; 8] = [
    "Madrid", "Barcelona", "Valencia", "Sevilla", "Bilbao", "Malaga", "Zaragoza", "Granada",
];

const CALLES: [&str; 8] = [
    "Calle Mayor",
    "Avenida de la Constitucion",
    "Calle del Sol",
    "Paseo de Gracia",
    "Calle Real",
    "Avenida del Puerto",
    "Calle San Juan",
    "Plaza de Espana",
];

const ESPECIALIDADES: [&str; 7] = [
    "Medicina general",
    "Pediatria",
    "Cardiologia",
    "Dermatologia",
    "Neumologia",
    "Gastroenterologia",
    "Alergologia",
];

const METODOS_PAGO: [&str; 3] = ["efectivo", "tarjeta", "transferencia"];

const DOC_TYPES: [(&str, u32); 5] = [
    ("product_description", 40),
    ("clinical_note", 20),
    ("prescription_explanation", 20),
    ("usage_guide", 15),
    ("pharmacy_notice", 5),
];

const LINKED_IMAGES: [(usize, u32); 3] = [(0, 60), (1, 30), (2, 10)];

/// Record counts and seed for [`generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub seed: u64,
    pub images: usize,
    pub documents: usize,
    pub proveedores: usize,
    pub medicamentos: usize,
    pub farmacias: usize,
    pub clientes: usize,
    pub doctores: usize,
    pub citas: usize,
    pub transacciones: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_F4A2_0000_0001,
            images: 50,
            documents: 100,
            proveedores: 20,
            medicamentos: 50,
            farmacias: 10,
            clientes: 40,
            doctores: 25,
            citas: 60,
            transacciones: 80,
        }
    }
}

impl DatasetConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Errors raised while reading or writing a dataset file.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to access dataset file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Every generated record, grouped by collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    #[serde(default)]
    pub text_documents: Vec<TextDocument>,
    #[serde(default)]
    pub proveedores: Vec<Proveedor>,
    #[serde(default)]
    pub medicamentos: Vec<Medicamento>,
    #[serde(default)]
    pub farmacias: Vec<Farmacia>,
    #[serde(default)]
    pub clientes: Vec<Cliente>,
    #[serde(default)]
    pub doctores: Vec<Doctor>,
    #[serde(default)]
    pub citas: Vec<Cita>,
    #[serde(default)]
    pub transacciones: Vec<Transaccion>,
}

impl Dataset {
    pub fn counts(&self) -> BTreeMap<Collection, usize> {
        BTreeMap::from([
            (Collection::Documents, self.text_documents.len()),
            (Collection::Images, self.images.len()),
            (Collection::Farmacias, self.farmacias.len()),
            (Collection::Medicamentos, self.medicamentos.len()),
            (Collection::Clientes, self.clientes.len()),
            (Collection::Proveedores, self.proveedores.len()),
            (Collection::Doctores, self.doctores.len()),
            (Collection::Citas, self.citas.len()),
            (Collection::Transacciones, self.transacciones.len()),
        ])
    }

    /// Flatten into store records, in collection order.
    pub fn into_entities(self) -> Vec<Entity> {
        let mut out = Vec::new();
        out.extend(self.text_documents.into_iter().map(Entity::Document));
        out.extend(self.images.into_iter().map(Entity::Image));
        out.extend(self.farmacias.into_iter().map(Entity::Farmacia));
        out.extend(self.medicamentos.into_iter().map(Entity::Medicamento));
        out.extend(self.clientes.into_iter().map(Entity::Cliente));
        out.extend(self.proveedores.into_iter().map(Entity::Proveedor));
        out.extend(self.doctores.into_iter().map(Entity::Doctor));
        out.extend(self.citas.into_iter().map(Entity::Cita));
        out.extend(self.transacciones.into_iter().map(Entity::Transaccion));
        out
    }

    /// Write pretty-printed JSON, creating parent directories.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), DatasetError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Generate a complete dataset with referentially consistent links.
pub fn generate(cfg: &DatasetConfig, now: DateTime<Utc>) -> Dataset {
    let mut g = Generator {
        rng: fastrand::Rng::with_seed(cfg.seed),
    };

    let proveedores: Vec<Proveedor> = (1..=cfg.proveedores).map(|i| g.proveedor(i)).collect();
    let proveedor_ids: Vec<String> = proveedores.iter().map(|p| p.id.clone()).collect();

    let medicamentos: Vec<Medicamento> = (1..=cfg.medicamentos)
        .map(|i| g.medicamento(i, &proveedor_ids))
        .collect();
    let med_ids: Vec<String> = medicamentos.iter().map(|m| m.id.clone()).collect();

    let images: Vec<ImageAsset> = (1..=cfg.images).map(|i| g.image(i, &med_ids)).collect();
    let image_ids: Vec<String> = images.iter().map(|img| img.id.clone()).collect();

    let text_documents = (1..=cfg.documents)
        .map(|i| g.document(i, &med_ids, &image_ids, now))
        .collect();

    let farmacias = (1..=cfg.farmacias).map(|i| g.farmacia(i, &med_ids)).collect();
    let clientes: Vec<Cliente> = (1..=cfg.clientes).map(|i| g.cliente(i)).collect();
    let doctores: Vec<Doctor> = (1..=cfg.doctores).map(|i| g.doctor(i)).collect();

    let citas: Vec<Cita> = (0..cfg.citas)
        .filter_map(|_| g.cita(&clientes, &doctores, &med_ids))
        .collect();
    let cita_ids: Vec<String> = citas.iter().map(|c| c.id.clone()).collect();

    let transacciones = (0..cfg.transacciones)
        .map(|_| g.transaccion(&cita_ids))
        .collect();

    Dataset {
        generated_at: now,
        seed: cfg.seed,
        images,
        text_documents,
        proveedores,
        medicamentos,
        farmacias,
        clientes,
        doctores,
        citas,
        transacciones,
    }
}

struct Generator {
    rng: fastrand::Rng,
}

impl Generator {
    fn uuid(&mut self) -> String {
        let mut bytes = [0u8; 16];
        self.rng.fill(&mut bytes);
        uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string()
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.rng.usize(..items.len())]
    }

    fn weighted<T: Copy>(&mut self, items: &[(T, u32)]) -> T {
        let total: u32 = items.iter().map(|(_, w)| w).sum();
        let mut roll = self.rng.u32(..total);
        for &(item, weight) in items {
            if roll < weight {
                return item;
            }
            roll -= weight;
        }
        items[items.len() - 1].0
    }

    /// Up to `k` distinct elements, in random order.
    fn sample(&mut self, items: &[String], k: usize) -> Vec<String> {
        let mut picked = items.to_vec();
        self.rng.shuffle(&mut picked);
        picked.truncate(k);
        picked
    }

    fn date(&mut self) -> DateTime<Utc> {
        let days = DATE_RANGE_START_DAYS + self.rng.i64(0..=DATE_RANGE_SPAN_DAYS);
        let seconds = self.rng.i64(8 * 3600..20 * 3600);
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(days) + TimeDelta::seconds(seconds)
    }

    fn telefono(&mut self) -> String {
        format!("+34 6{:08}", self.rng.u32(..100_000_000))
    }

    fn direccion(&mut self) -> String {
        let calle = self.pick(&CALLES);
        format!("{calle} {}", self.rng.u32(1..200))
    }

    fn persona(&mut self) -> String {
        let nombre = self.pick(&NOMBRES);
        let apellido = self.pick(&APELLIDOS);
        format!("{nombre} {apellido}")
    }

    fn proveedor(&mut self, i: usize) -> Proveedor {
        let apellido = self.pick(&APELLIDOS);
        Proveedor {
            id: format!("P{i:04}"),
            nombre: format!("Distribuciones {apellido} S.L."),
            telefono: self.telefono(),
            direccion: self.direccion(),
            ciudad: self.pick(&CIUDADES).to_string(),
        }
    }

    fn medicamento(&mut self, i: usize, proveedores: &[String]) -> Medicamento {
        let principio = self.pick(&PRINCIPIOS);
        let presentacion = self.pick(&PRESENTACIONES);
        let topic = self.pick(&TOPICS);
        let cents = self.rng.u32(150..8_000);
        let n_prov = self.rng.usize(1..=3);
        Medicamento {
            id: format!("M{i:04}"),
            nombre: format!("{principio} {presentacion}"),
            precio: f64::from(cents) / 100.0,
            categoria: Categoria {
                nombre: topic.to_string(),
                descripcion: Some(format!("Medicamentos {}", topic.to_lowercase())),
            },
            proveedores: self.sample(proveedores, n_prov),
        }
    }

    fn image(&mut self, i: usize, med_ids: &[String]) -> ImageAsset {
        let id = self.uuid();
        let related_med_id = if med_ids.is_empty() {
            None
        } else {
            Some(med_ids[self.rng.usize(..med_ids.len())].clone())
        };
        ImageAsset {
            url: format!("https://picsum.photos/seed/{id}/1024/768"),
            id,
            filename: format!("med_image_{i}.jpg"),
            caption: Some(format!("Imagen de producto medicamento #{i}")),
            metadata: Some(ImageMetadata {
                resolution: Some("1024x768".into()),
                format: Some("jpeg".into()),
                source: Some("placeholder_picsum".into()),
                created_at: Some(self.date()),
            }),
            related_med_id,
            embeddings: None,
            embedding_model: None,
        }
    }

    fn document(
        &mut self,
        i: usize,
        med_ids: &[String],
        image_ids: &[String],
        now: DateTime<Utc>,
    ) -> TextDocument {
        let med = if med_ids.is_empty() {
            None
        } else {
            Some(med_ids[self.rng.usize(..med_ids.len())].clone())
        };
        let med_label = med.as_deref().unwrap_or("general");
        let doc_type = self.weighted(&DOC_TYPES);

        let (title, body) = match doc_type {
            "product_description" => (
                format!("Ficha tecnica {med_label}"),
                "Descripcion del medicamento, indicaciones, dosis y precauciones. \
                 Presentacion en tabletas/jarabe/crema. Mantener fuera del alcance de los ninos.",
            ),
            "clinical_note" => (
                format!("Nota clinica {med_label} - Caso {i}"),
                "Paciente presenta sintomas leves. Recomendado seguimiento clinico y \
                 revision de interacciones.",
            ),
            "prescription_explanation" => (
                format!("Explicacion de receta para {med_label}"),
                "Administrar 1 tableta cada 8 horas durante 7 dias. No tomar con alcohol.",
            ),
            "usage_guide" => (
                format!("Guia de uso de {med_label}"),
                "Lea el prospecto antes de usar. No exceder la dosis indicada. \
                 Conservar a temperatura ambiente.",
            ),
            _ => (
                format!("Aviso de farmacia F{}", self.rng.u32(1..=7)),
                "Horario de atencion extendido esta semana por inventario. \
                 Llevar receta original para controlados.",
            ),
        };

        let mut content = body.to_string();
        for j in 0..self.rng.usize(0..=20) {
            content.push_str(&format!(" detalle_{j}"));
        }

        let n_images = self.weighted(&LINKED_IMAGES);
        let images = self.sample(image_ids, n_images);

        let mut metadata = Map::new();
        metadata.insert(
            "author".into(),
            json!(self.pick(&["Farmaceutico A", "Sistema", "Dr. X"])),
        );
        metadata.insert(
            "source".into(),
            json!(self.pick(&["internal", "manufacturer", "doctor_note", "patient_upload"])),
        );
        metadata.insert(
            "length_words".into(),
            Value::from(content.split_whitespace().count()),
        );

        TextDocument {
            id: self.uuid(),
            doc_type: Some(doc_type.to_string()),
            title,
            content,
            language: Language::Es,
            related_medicamento: med,
            tags: vec![self.pick(&TOPICS).to_string()],
            images,
            metadata,
            embeddings: None,
            embedding_model: None,
            ingest_ts: Some(now),
        }
    }

    fn farmacia(&mut self, i: usize, med_ids: &[String]) -> Farmacia {
        let n_empleados = self.rng.usize(2..=5);
        let empleados = (0..n_empleados).map(|_| self.persona()).collect();
        let n_meds = self.rng.usize(3..=10);
        Farmacia {
            id: format!("F{i:04}"),
            ciudad: self.pick(&CIUDADES).to_string(),
            direccion: self.direccion(),
            telefono: self.telefono(),
            empleados,
            medicamentos: self.sample(med_ids, n_meds),
        }
    }

    fn cliente(&mut self, i: usize) -> Cliente {
        Cliente {
            id: format!("C{i:04}"),
            nombre: self.persona(),
            direccion: self.direccion(),
            telefono: self.telefono(),
        }
    }

    fn doctor(&mut self, i: usize) -> Doctor {
        Doctor {
            id: format!("D{i:04}"),
            nombre: self.pick(&NOMBRES).to_string(),
            apellido: self.pick(&APELLIDOS).to_string(),
            especialidad: self.pick(&ESPECIALIDADES).to_string(),
            telefono: self.telefono(),
        }
    }

    /// `None` when there are no clientes or doctores to reference.
    fn cita(
        &mut self,
        clientes: &[Cliente],
        doctores: &[Doctor],
        med_ids: &[String],
    ) -> Option<Cita> {
        if clientes.is_empty() || doctores.is_empty() {
            return None;
        }
        let cliente = &clientes[self.rng.usize(..clientes.len())];
        let doctor = &doctores[self.rng.usize(..doctores.len())];
        let n_receta = self.rng.usize(0..=3);
        Some(Cita {
            id: self.uuid(),
            fecha: self.date(),
            cliente: EntityRef {
                id: cliente.id.clone(),
                nombre: Some(cliente.nombre.clone()),
            },
            doctor: EntityRef {
                id: doctor.id.clone(),
                nombre: Some(format!("{} {}", doctor.nombre, doctor.apellido)),
            },
            receta: self.sample(med_ids, n_receta),
        })
    }

    fn transaccion(&mut self, cita_ids: &[String]) -> Transaccion {
        let cents = self.rng.u32(200..25_000);
        let citaref = if !cita_ids.is_empty() && self.rng.bool() {
            Some(cita_ids[self.rng.usize(..cita_ids.len())].clone())
        } else {
            None
        };
        Transaccion {
            id: self.uuid(),
            fecha: self.date(),
            totalpagado: f64::from(cents) / 100.0,
            metodopago: self.pick(&METODOS_PAGO).to_string(),
            empleado: vec![self.persona()],
            citaref,
        }
    }
}
