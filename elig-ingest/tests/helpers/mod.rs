//! Scratch project builder shared by the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use elig_common::config::RunConfig;
use elig_common::db::open_in_memory;
use elig_ingest::services::RunController;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

pub const DENTAL_CSV: &str = "\
member_id,first,last,dob,rel,addr
D1,Ann,O'Brien ,01/15/1990,EMP,1 Main St
D2,Bob,Smith,13/45/1990,SPS,2 Oak Ave
D3,Cy,Jones,03/02/2015,XYZ,
";

pub const DENTAL_YAML: &str = r#"
source_vendor: dental
file: dental.csv
format: csv
constants:
  plan_type: DENTAL
  provider: Delta
mapping:
  member_id: member_id
  first_name_raw: first
  last_name_raw: last
  dob_raw: dob
  relationship_raw: rel
  address_line1: addr
"#;

pub const NORMALIZATION_YAML: &str = r#"
relationship_mappings:
  dental:
    EMP: employee
    SPS: spouse
  medical_c:
    "01": employee
    "02": dependent
  hospital:
    SUB: employee
date_formats:
  dental: "%m/%d/%Y"
  hospital: "%Y-%m-%d"
  medical_c: "%Y-%m-%d"
  vision: "%Y%m%d"
"#;

pub const MEDICAL_C_YAML: &str = r#"
source_vendor: medical_c
file: medical_c.jsonl
format: jsonl
constants:
  plan_type: MEDICAL
mapping:
  member_id: member.id
  first_name_raw: name.first
  last_name_raw: name.last
  relationship_raw: rel
derivations:
  dob_raw:
    type: join_ymd_to_string
    year: dob.year
    month: dob.month
    day: dob.day
extra_payload:
  - notes
"#;

pub const MEDICAL_C_JSONL: &str = r#"{"member": {"id": "C1"}, "name": {"first": "Dee", "last": "Lee"}, "dob": {"year": 1980, "month": 7, "day": 4}, "rel": "01", "notes": "vip"}
{"member": {"id": "C2"}, "name": {"first": "Eve", "last": "Lee"}, "dob": {"year": 2010, "month": 12, "day": 1}, "rel": "02"}
"#;

pub const VISION_TOML: &str = r#"
source_vendor = "vision"
file = "vision.txt"
format = "pipe_delimited"

[constants]
plan_type = "VISION"

[mapping]
member_id = "ID"
first_name_raw = "FNAME"
last_name_raw = "LNAME"
dob_raw = "BIRTH"
relationship_raw = "REL"
"#;

pub const VISION_TXT: &str = "\
ID|FNAME|LNAME|BIRTH|REL
V1|Fay|Kim|19750310|E
";

pub const HOSPITAL_YAML: &str = r#"
source_vendor: hospital
file: hospital.xlsx
format: xlsx
sheet: Members
constants:
  plan_type: HOSPITAL
mapping:
  member_id: MEMBER
  last_name_raw: SURNAME
  dob_raw: BORN
  relationship_raw: ROLE
"#;

/// Header plus one member, on the second sheet of the workbook
pub const HOSPITAL_ROWS: &[&[&str]] = &[
    &["MEMBER", "SURNAME", "BORN", "ROLE"],
    &["H1", "Strauß", "1968-11-30", "SUB"],
];

/// A temporary project root with `input/` and `mappings/`
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("input")).unwrap();
        fs::create_dir_all(dir.path().join("mappings")).unwrap();
        Self { dir }
    }

    /// The dental vendor plus the normalization document
    pub fn dental() -> Self {
        Self::new()
            .mapping("dental.yaml", DENTAL_YAML)
            .input("dental.csv", DENTAL_CSV)
            .mapping("relationship_normalization.yaml", NORMALIZATION_YAML)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn mapping(self, name: &str, text: &str) -> Self {
        fs::write(self.root().join("mappings").join(name), text).unwrap();
        self
    }

    pub fn input(self, name: &str, text: &str) -> Self {
        fs::write(self.root().join("input").join(name), text).unwrap();
        self
    }

    /// Workbook under `input/` with a leading `Cover` sheet and `rows` on `sheet`
    pub fn workbook(self, name: &str, sheet: &str, rows: &[&[&str]]) -> Self {
        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("Cover").unwrap();
        let data = workbook.add_worksheet();
        data.set_name(sheet).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                data.write_string(r as u32, c as u16, *cell).unwrap();
            }
        }
        workbook.save(self.root().join("input").join(name)).unwrap();
        self
    }

    pub fn pipeline_toml(self, text: &str) -> Self {
        fs::write(self.root().join("pipeline.toml"), text).unwrap();
        self
    }

    pub fn config(&self) -> RunConfig {
        RunConfig::from_root(self.root()).unwrap()
    }

    /// Controller over an in-memory warehouse
    pub async fn controller(&self) -> RunController {
        RunController::new(self.config(), open_in_memory().await.unwrap())
    }
}
