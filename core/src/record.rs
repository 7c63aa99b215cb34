use crate::error::{CoreError, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub type RecordId = u32;

/// Placeholder the cleaned dataset uses for missing cells.
pub const MISSING: &str = "no";

/// Nutrient columns carried alongside each food, in dataset order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nutrient {
    ServingSizeG,
    CaloriesKcal,
    ProteinG,
    FatG,
    CarbohydratesG,
    VitaminAMg,
    VitaminB6Mg,
    VitaminB12Mg,
    VitaminCMg,
    VitaminDMg,
    VitaminEMg,
    CalciumMg,
    IronMg,
    PotassiumMg,
    MagnesiumMg,
    SeleniumMg,
    ZincMg,
    IodineMg,
}

impl Nutrient {
    pub const COUNT: usize = 18;

    pub const ALL: [Nutrient; Self::COUNT] = [
        Nutrient::ServingSizeG,
        Nutrient::CaloriesKcal,
        Nutrient::ProteinG,
        Nutrient::FatG,
        Nutrient::CarbohydratesG,
        Nutrient::VitaminAMg,
        Nutrient::VitaminB6Mg,
        Nutrient::VitaminB12Mg,
        Nutrient::VitaminCMg,
        Nutrient::VitaminDMg,
        Nutrient::VitaminEMg,
        Nutrient::CalciumMg,
        Nutrient::IronMg,
        Nutrient::PotassiumMg,
        Nutrient::MagnesiumMg,
        Nutrient::SeleniumMg,
        Nutrient::ZincMg,
        Nutrient::IodineMg,
    ];

    /// Column name in the dataset.
    pub fn name(self) -> &'static str {
        match self {
            Nutrient::ServingSizeG => "serving_size_g",
            Nutrient::CaloriesKcal => "calories_kcal",
            Nutrient::ProteinG => "protein_g",
            Nutrient::FatG => "fat_g",
            Nutrient::CarbohydratesG => "carbohydrates_g",
            Nutrient::VitaminAMg => "vitamin_a_mg",
            Nutrient::VitaminB6Mg => "vitamin_b6_mg",
            Nutrient::VitaminB12Mg => "vitamin_b12_mg",
            Nutrient::VitaminCMg => "vitamin_c_mg",
            Nutrient::VitaminDMg => "vitamin_d_mg",
            Nutrient::VitaminEMg => "vitamin_e_mg",
            Nutrient::CalciumMg => "calcium_mg",
            Nutrient::IronMg => "iron_mg",
            Nutrient::PotassiumMg => "potassium_mg",
            Nutrient::MagnesiumMg => "magnesium_mg",
            Nutrient::SeleniumMg => "selenium_mg",
            Nutrient::ZincMg => "zinc_mg",
            Nutrient::IodineMg => "iodine_mg",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|n| n.name() == name)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Nutrient amounts for one food. `None` marks a value missing from the dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nutrients([Option<f64>; Nutrient::COUNT]);

impl Nutrients {
    pub fn get(&self, nutrient: Nutrient) -> Option<f64> {
        self.0[nutrient.slot()]
    }

    pub fn set(&mut self, nutrient: Nutrient, value: Option<f64>) {
        self.0[nutrient.slot()] = value;
    }

    pub fn with(mut self, nutrient: Nutrient, value: f64) -> Self {
        self.set(nutrient, Some(value));
        self
    }

    /// Display form of a value, `no` when missing.
    pub fn display(&self, nutrient: Nutrient) -> String {
        match self.get(nutrient) {
            Some(v) => v.to_string(),
            None => MISSING.to_string(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Nutrient, Option<f64>)> + '_ {
        Nutrient::ALL.iter().map(move |n| (*n, self.get(*n)))
    }
}

impl Serialize for Nutrients {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Nutrient::COUNT))?;
        for (nutrient, value) in self.iter() {
            map.serialize_entry(nutrient.name(), &value)?;
        }
        map.end()
    }
}

/// One food item of the nutrition dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodRecord {
    pub id: RecordId,
    pub food: String,
    pub allergens: String,
    #[serde(flatten)]
    pub nutrients: Nutrients,
}

impl FoodRecord {
    pub fn new(id: RecordId, food: impl Into<String>, allergens: impl Into<String>) -> Self {
        Self { id, food: food.into(), allergens: allergens.into(), nutrients: Nutrients::default() }
    }

    pub fn with_nutrients(mut self, nutrients: Nutrients) -> Self {
        self.nutrients = nutrients;
        self
    }
}

/// Anything that carries a record identifier.
pub trait Identified {
    fn record_id(&self) -> RecordId;
}

impl Identified for RecordId {
    fn record_id(&self) -> RecordId {
        *self
    }
}

impl<T: Identified + ?Sized> Identified for &T {
    fn record_id(&self) -> RecordId {
        (**self).record_id()
    }
}

/// Field access by name, the view the text index builds over.
pub trait Document: Identified {
    /// Value of the named field, `None` if the record has no such field.
    fn field(&self, name: &str) -> Option<Cow<'_, str>>;
}

impl Identified for FoodRecord {
    fn record_id(&self) -> RecordId {
        self.id
    }
}

impl Document for FoodRecord {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "id" => Some(Cow::Owned(self.id.to_string())),
            "food" => Some(Cow::Borrowed(&self.food)),
            "allergens" => Some(Cow::Borrowed(&self.allergens)),
            other => Nutrient::from_name(other).map(|n| Cow::Owned(self.nutrients.display(n))),
        }
    }
}

/// The fixed collection of food records loaded from the cleaned dataset.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<FoodRecord>,
}

impl RecordStore {
    /// Wrap records, rejecting duplicate identifiers.
    pub fn from_records(records: Vec<FoodRecord>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for r in &records {
            if !seen.insert(r.id) {
                return Err(CoreError::DuplicateId(r.id));
            }
        }
        Ok(Self { records })
    }

    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path.as_ref())?;
        let store = Self::from_reader(f)?;
        tracing::info!(path = %path.as_ref().display(), num_records = store.len(), "loaded records");
        Ok(store)
    }

    /// Read comma-separated records with a header row. Columns are resolved by name once.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        let positions: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h.trim(), i)).collect();
        let column = |name: &str| -> Result<usize> {
            positions
                .get(name)
                .copied()
                .ok_or_else(|| CoreError::Schema { record: 0, field: name.to_string() })
        };

        let id_col = column("id")?;
        let food_col = column("food")?;
        let allergens_col = column("allergens")?;
        let mut nutrient_cols = Vec::with_capacity(Nutrient::COUNT);
        for n in Nutrient::ALL {
            nutrient_cols.push((n, column(n.name())?));
        }

        let mut records = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let rec = result?;
            let cell = |col: usize| rec.get(col).unwrap_or("").trim();
            let id = parse_id(cell(id_col), row)?;
            let mut nutrients = Nutrients::default();
            for (n, col) in &nutrient_cols {
                nutrients.set(*n, parse_amount(cell(*col), row, n.name())?);
            }
            records.push(FoodRecord {
                id,
                food: cell(food_col).to_string(),
                allergens: cell(allergens_col).to_string(),
                nutrients,
            });
        }
        Self::from_records(records)
    }

    pub fn records(&self) -> &[FoodRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<FoodRecord> {
        self.records
    }

    pub fn get(&self, id: RecordId) -> Option<&FoodRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_id(value: &str, row: usize) -> Result<RecordId> {
    // pandas may write integral ids as floats ("12.0")
    let trimmed = value.strip_suffix(".0").unwrap_or(value);
    trimmed.parse::<RecordId>().map_err(|_| CoreError::InvalidValue {
        row,
        column: "id".to_string(),
        value: value.to_string(),
    })
}

fn parse_amount(value: &str, row: usize, column: &str) -> Result<Option<f64>> {
    if value.is_empty() || value.eq_ignore_ascii_case(MISSING) {
        return Ok(None);
    }
    value.parse::<f64>().map(Some).map_err(|_| CoreError::InvalidValue {
        row,
        column: column.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> String {
        let mut cols = vec!["id", "food"];
        cols.extend(Nutrient::ALL.iter().map(|n| n.name()));
        cols.push("allergens");
        cols.join(",")
    }

    fn row(id: &str, food: &str, protein: &str, allergens: &str) -> String {
        let mut cells = vec![id.to_string(), food.to_string()];
        for n in Nutrient::ALL {
            cells.push(if n == Nutrient::ProteinG { protein.to_string() } else { "1.5".to_string() });
        }
        cells.push(allergens.to_string());
        cells.join(",")
    }

    #[test]
    fn loads_records_and_missing_values() {
        let csv = format!("{}\n{}\n{}\n", header(), row("0", "Tofu", "8.1", "soy"), row("3", "Apple", "no", "no"));
        let store = RecordStore::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);
        let tofu = store.get(0).unwrap();
        assert_eq!(tofu.nutrients.get(Nutrient::ProteinG), Some(8.1));
        let apple = store.get(3).unwrap();
        assert_eq!(apple.nutrients.get(Nutrient::ProteinG), None);
        assert_eq!(apple.field("protein_g").as_deref(), Some("no"));
        assert_eq!(apple.field("id").as_deref(), Some("3"));
    }

    #[test]
    fn missing_column_is_schema_error() {
        let csv = "id,food\n0,Tofu\n";
        let err = RecordStore::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
    }

    #[test]
    fn bad_number_names_the_cell() {
        let csv = format!("{}\n{}\n", header(), row("0", "Tofu", "lots", "soy"));
        let err = RecordStore::from_reader(csv.as_bytes()).unwrap_err();
        match err {
            CoreError::InvalidValue { row, column, .. } => {
                assert_eq!(row, 0);
                assert_eq!(column, "protein_g");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let records = vec![FoodRecord::new(1, "Tofu", "soy"), FoodRecord::new(1, "Duck", "no")];
        assert!(matches!(RecordStore::from_records(records), Err(CoreError::DuplicateId(1))));
    }

    #[test]
    fn unknown_field_is_none() {
        let r = FoodRecord::new(7, "Duck", "no");
        assert!(r.field("colour").is_none());
        assert_eq!(r.field("food").as_deref(), Some("Duck"));
    }
}
