use std::collections::HashSet;
use std::ops::Index;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::text_eq_case_insensitive;

use super::TableError;

/// Aggregate shown in a table's totals row for one column.
///
/// Variant names follow the OOXML `totalsRowFunction` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TotalsRowFunction {
    #[default]
    None,
    Sum,
    Min,
    Max,
    Average,
    Count,
    CountNums,
    StdDev,
    Var,
    /// Uses [`TableColumn::totals_formula`].
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown totals row function '{0}'")]
pub struct UnknownTotalsRowFunction(pub String);

impl TotalsRowFunction {
    #[must_use]
    pub fn as_attr(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Average => "average",
            Self::Count => "count",
            Self::CountNums => "countNums",
            Self::StdDev => "stdDev",
            Self::Var => "var",
            Self::Custom => "custom",
        }
    }

    #[must_use]
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "average" => Some(Self::Average),
            "count" => Some(Self::Count),
            "countNums" => Some(Self::CountNums),
            "stdDev" => Some(Self::StdDev),
            "var" => Some(Self::Var),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Lenient parse: unknown input yields [`TotalsRowFunction::None`].
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        Self::from_attr(value.trim()).unwrap_or_default()
    }

    /// `SUBTOTAL` function number; the 10x forms ignore filtered-out rows.
    #[must_use]
    pub fn subtotal_code(self) -> Option<u32> {
        match self {
            Self::Average => Some(101),
            Self::CountNums => Some(102),
            Self::Count => Some(103),
            Self::Max => Some(104),
            Self::Min => Some(105),
            Self::StdDev => Some(107),
            Self::Sum => Some(109),
            Self::Var => Some(110),
            Self::None | Self::Custom => None,
        }
    }
}

impl FromStr for TotalsRowFunction {
    type Err = UnknownTotalsRowFunction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_attr(s).ok_or_else(|| UnknownTotalsRowFunction(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub totals_row_function: TotalsRowFunction,
    /// Text shown in the totals row when there is no function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals_row_label: Option<String>,
    /// Formula for calculated columns (stored without leading '=').
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Totals row formula for [`TotalsRowFunction::Custom`] (stored without leading '=').
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals_formula: Option<String>,
}

impl TableColumn {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            totals_row_function: TotalsRowFunction::None,
            totals_row_label: None,
            formula: None,
            totals_formula: None,
        }
    }
}

/// Ordered columns of a table. Position `i` is the table's `i`-th column from the left.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableColumnSet {
    columns: Vec<TableColumn>,
}

impl TableColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build columns from header cell texts.
    ///
    /// Blank headers get `Column{n}` names; repeated names get a numeric suffix
    /// (`Qty`, `Qty2`, ...). Ids are assigned from 1.
    pub fn from_header_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        let mut next_default: u32 = 1;
        for (idx, name) in names.into_iter().enumerate() {
            let name = name
                .as_ref()
                .map(|s| s.as_ref().trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let name = match name {
                Some(name) => set.unique_name(&name),
                None => loop {
                    let candidate = format!("Column{next_default}");
                    next_default += 1;
                    if set.index_of(&candidate).is_none() {
                        break candidate;
                    }
                },
            };
            set.columns.push(TableColumn::new(idx as u32 + 1, name));
        }
        set
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TableColumn> {
        self.columns.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TableColumn> {
        self.columns.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TableColumn> {
        self.columns.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, TableColumn> {
        self.columns.iter_mut()
    }

    /// Case-insensitive lookup by column name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| text_eq_case_insensitive(&c.name, name))
    }

    /// Insert `count` new columns before `index` (`index == len` appends).
    ///
    /// New columns get fresh ids, `Column{n}` names that do not collide with
    /// existing ones, and no totals function. Returns the inserted positions.
    pub fn insert_at(
        &mut self,
        index: usize,
        count: usize,
    ) -> Result<std::ops::Range<usize>, TableError> {
        if index > self.columns.len() {
            return Err(TableError::ColumnIndexOutOfRange {
                index,
                count,
                len: self.columns.len(),
            });
        }

        let mut used_default_nums: HashSet<u32> = self
            .columns
            .iter()
            .filter_map(|c| parse_default_column_number(&c.name))
            .collect();
        let mut next_id = self.next_id();
        let mut next_default_num: u32 = 1;

        let fresh: Vec<TableColumn> = (0..count)
            .map(|_| {
                let name = loop {
                    let n = next_default_num;
                    next_default_num = next_default_num.saturating_add(1);
                    if used_default_nums.insert(n) && self.index_of(&format!("Column{n}")).is_none() {
                        break format!("Column{n}");
                    }
                };
                let column = TableColumn::new(next_id, name);
                next_id += 1;
                column
            })
            .collect();
        self.columns.splice(index..index, fresh);
        Ok(index..index + count)
    }

    /// Remove `count` columns starting at `index`.
    ///
    /// Removing every column is refused: a table without columns has no
    /// range, so that case goes through table deletion instead.
    pub fn remove_at(&mut self, index: usize, count: usize) -> Result<Vec<TableColumn>, TableError> {
        let len = self.columns.len();
        let end = index.checked_add(count);
        if end.map_or(true, |end| end > len) {
            return Err(TableError::ColumnIndexOutOfRange { index, count, len });
        }
        if count == len {
            return Err(TableError::CannotRemoveAllColumns);
        }
        Ok(self.columns.drain(index..index + count).collect())
    }

    fn next_id(&self) -> u32 {
        self.columns.iter().map(|c| c.id).max().unwrap_or(0) + 1
    }

    fn unique_name(&self, base: &str) -> String {
        if self.index_of(base).is_none() {
            return base.to_string();
        }
        (2u32..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| self.index_of(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }
}

impl Index<usize> for TableColumnSet {
    type Output = TableColumn;

    fn index(&self, index: usize) -> &TableColumn {
        &self.columns[index]
    }
}

impl<'a> IntoIterator for &'a TableColumnSet {
    type Item = &'a TableColumn;
    type IntoIter = std::slice::Iter<'a, TableColumn>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

impl From<Vec<TableColumn>> for TableColumnSet {
    fn from(columns: Vec<TableColumn>) -> Self {
        Self { columns }
    }
}

fn parse_default_column_number(name: &str) -> Option<u32> {
    let bytes = name.as_bytes();
    let prefix = b"column";
    if bytes.len() <= prefix.len() {
        return None;
    }
    if !bytes
        .get(..prefix.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(prefix))
    {
        return None;
    }
    // Only canonical `Column{n}` (no leading zeros) collides with generated names.
    let digit_bytes = &bytes[prefix.len()..];
    if digit_bytes.len() > 1 && digit_bytes[0] == b'0' {
        return None;
    }
    if !digit_bytes.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name[prefix.len()..].parse().ok().filter(|n: &u32| *n > 0)
}
