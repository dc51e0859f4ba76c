//! Field schemas bound to feature streams.
//!
//! A schema names the metadata columns of every feature in a stream and fixes
//! their kinds. Name lookups are resolved to column offsets once, when an
//! operator is built, and the offsets are then used for every row.

use crate::error::{Result, StreamError};
use crate::value::ValueKind;
use rustc_hash::FxHashMap;

/// Reserved name of the structural start coordinate.
pub const START: &str = "start";
/// Reserved name of the structural end coordinate.
pub const END: &str = "end";
/// Conventional chromosome column.
pub const CHR: &str = "chr";
/// Conventional strand column.
pub const STRAND: &str = "strand";
/// Conventional name column.
pub const NAME: &str = "name";

/// Returns true for the structural coordinate names.
#[inline]
pub fn is_coordinate(name: &str) -> bool {
    name == START || name == END
}

/// A named, typed metadata column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub kind: ValueKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Float)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Text)
    }

    pub fn record(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Record)
    }
}

/// Ordered list of unique metadata fields.
///
/// `start` and `end` are always present structurally and never appear as
/// columns.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
    index: FxHashMap<String, usize>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Schema {
    /// Build a schema, rejecting duplicate or reserved names.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut index = FxHashMap::default();
        for (i, field) in fields.iter().enumerate() {
            if is_coordinate(&field.name) {
                return Err(StreamError::schema(
                    &field.name,
                    "is a reserved coordinate name",
                ));
            }
            if index.insert(field.name.clone(), i).is_some() {
                return Err(StreamError::schema(&field.name, "appears more than once"));
            }
        }
        Ok(Self { fields, index })
    }

    /// A schema with no metadata columns.
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[inline]
    pub fn field(&self, idx: usize) -> &Field {
        &self.fields[idx]
    }

    /// Field names in column order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// True if the stream carries `name`, counting the coordinates.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        is_coordinate(name) || self.index.contains_key(name)
    }

    /// Column index of a field that must be present.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| StreamError::missing_field(name))
    }

    #[inline]
    pub fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.index_of(name).map(|i| self.fields[i].kind)
    }

    #[inline]
    pub fn chr_index(&self) -> Option<usize> {
        self.index_of(CHR)
    }

    #[inline]
    pub fn strand_index(&self) -> Option<usize> {
        self.index_of(STRAND)
    }

    /// A copy of this schema with one more column appended.
    pub fn with_field(&self, field: Field) -> Result<Schema> {
        let mut fields = self.fields.clone();
        fields.push(field);
        Schema::new(fields)
    }

    /// Plan a projection onto exactly `names` (coordinate names are skipped).
    ///
    /// Returns the projected schema and, for each output column, the source
    /// column it is read from.
    pub fn project(&self, names: &[&str]) -> Result<(Schema, Vec<usize>)> {
        let mut columns = Vec::with_capacity(names.len());
        let mut fields = Vec::with_capacity(names.len());
        for name in names.iter().filter(|n| !is_coordinate(n)) {
            let idx = self.require(name)?;
            columns.push(idx);
            fields.push(self.fields[idx].clone());
        }
        Ok((Schema::new(fields)?, columns))
    }

    /// Plan moving `names` to the front, keeping the rest in their order.
    ///
    /// Returns `None` when the columns are already in the requested order.
    pub fn reorder_plan(&self, names: &[&str]) -> Result<Option<(Schema, Vec<usize>)>> {
        let mut front = Vec::with_capacity(names.len());
        for name in names.iter().filter(|n| !is_coordinate(n)) {
            let idx = self.require(name)?;
            if !front.contains(&idx) {
                front.push(idx);
            }
        }
        if front.iter().enumerate().all(|(pos, &idx)| pos == idx) {
            return Ok(None);
        }
        let mut columns = front.clone();
        columns.extend((0..self.len()).filter(|i| !front.contains(i)));
        let fields = columns.iter().map(|&i| self.fields[i].clone()).collect();
        Ok(Some((Schema::new(fields)?, columns)))
    }

    /// Map each column of `target` to the column of `self` with the same name.
    ///
    /// Columns absent here map to `None`; a name present in both with a
    /// different kind is a schema error.
    pub fn projection_onto(&self, target: &Schema) -> Result<Vec<Option<usize>>> {
        target
            .fields
            .iter()
            .map(|field| match self.index_of(&field.name) {
                Some(idx) if self.fields[idx].kind != field.kind => Err(StreamError::schema(
                    &field.name,
                    format!(
                        "has kind {} here but {} in the first stream",
                        self.fields[idx].kind, field.kind
                    ),
                )),
                found => Ok(found),
            })
            .collect()
    }
}
