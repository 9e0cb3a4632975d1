use serde::Serialize;
use serde_json::Value;

use bofrt_contracts::{
    BOFRT_OUTPUT_REPORT_SCHEMA_VERSION, BOFRT_PACK_REPORT_SCHEMA_VERSION,
    BOFRT_UNPACK_REPORT_SCHEMA_VERSION,
};
use bofrt_core::schema::wide_to_string;
use bofrt_core::{Field, OutputCategory};

#[derive(Debug, Serialize)]
pub struct PackReport {
    pub schema_version: &'static str,
    pub ok: bool,
    pub schema: String,
    pub len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PackReport {
    pub fn new(schema: &str) -> Self {
        Self {
            schema_version: BOFRT_PACK_REPORT_SCHEMA_VERSION,
            ok: false,
            schema: schema.to_string(),
            len: 0,
            hex: None,
            out: None,
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldReport {
    pub kind: &'static str,
    pub value: Value,
}

impl FieldReport {
    pub fn from_field(field: &Field<'_>) -> Self {
        let value = match *field {
            Field::Int(v) => Value::from(v),
            Field::Short(v) => Value::from(v),
            Field::Blob(b) => Value::from(hex::encode(b)),
            Field::Str(b) => Value::from(String::from_utf8_lossy(b).into_owned()),
            Field::WideStr(b) => Value::from(wide_to_string(b)),
        };
        Self {
            kind: field.kind().as_str(),
            value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnpackReport {
    pub schema_version: &'static str,
    pub ok: bool,
    pub schema: String,
    pub fields: Vec<FieldReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnpackReport {
    pub fn new(schema: &str) -> Self {
        Self {
            schema_version: BOFRT_UNPACK_REPORT_SCHEMA_VERSION,
            ok: false,
            schema: schema.to_string(),
            fields: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordReport {
    pub category: &'static str,
    pub tag: i32,
    pub text: String,
    pub hex: String,
}

impl RecordReport {
    pub fn new(tag: i32, data: &[u8]) -> Self {
        Self {
            category: OutputCategory::from_raw(tag)
                .map(OutputCategory::as_str)
                .unwrap_or("unknown"),
            tag,
            text: String::from_utf8_lossy(data).into_owned(),
            hex: hex::encode(data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutputReport {
    pub schema_version: &'static str,
    pub ok: bool,
    pub records: Vec<RecordReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutputReport {
    pub fn new() -> Self {
        Self {
            schema_version: BOFRT_OUTPUT_REPORT_SCHEMA_VERSION,
            ok: false,
            records: Vec::new(),
            error: None,
        }
    }
}

pub fn print_json<T: Serialize>(report: &T) -> anyhow::Result<()> {
    let mut out = serde_json::to_string_pretty(report)?;
    out.push('\n');
    print!("{out}");
    Ok(())
}
