use anyhow::Result;
use std::collections::HashMap;

use super::{View, ViewError};

/// Views of one scope, keyed by upper-cased name
#[derive(Debug, Clone, Default)]
pub struct InlineTableMap {
    tables: HashMap<String, View>,
}

impl InlineTableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `view` under `name`, renaming its columns to `fields` when given
    pub fn insert(&mut self, name: &str, fields: &[String], mut view: View) -> Result<(), ViewError> {
        if self.contains(name) {
            return Err(ViewError::Redefined(name.to_string()));
        }

        view.update_header(name, fields)?;
        view.source = None;
        self.tables.insert(name.to_uppercase(), view);
        Ok(())
    }

    /// Copy of the view registered under `name`
    pub fn get(&self, name: &str) -> Result<View, ViewError> {
        self.tables
            .get(&name.to_uppercase())
            .cloned()
            .ok_or_else(|| ViewError::Undefined(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Query producing the records of an inline table. It may read tables defined
/// before it.
pub type InlineQuery<'a> = Box<dyn FnOnce(&InlineTables) -> Result<View> + 'a>;

/// One definition of a `WITH`-style clause
pub struct InlineTable<'a> {
    pub name: String,
    pub fields: Vec<String>,
    pub query: InlineQuery<'a>,
}

impl<'a> InlineTable<'a> {
    pub fn new<F>(name: impl Into<String>, fields: Vec<String>, query: F) -> Self
    where
        F: FnOnce(&InlineTables) -> Result<View> + 'a,
    {
        Self {
            name: name.into(),
            fields,
            query: Box::new(query),
        }
    }
}

/// Stack of [`InlineTableMap`] scopes; the last one is the innermost
#[derive(Debug, Clone)]
pub struct InlineTables {
    scopes: Vec<InlineTableMap>,
}

impl InlineTables {
    pub fn new() -> Self {
        Self {
            scopes: vec![InlineTableMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(InlineTableMap::new());
    }

    /// Drop the innermost scope. The root scope is never removed.
    pub fn pop_scope(&mut self) -> Option<InlineTableMap> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Evaluate `query` and register its result in the innermost scope
    ///
    /// Redefinition within the same scope is checked before the query runs.
    pub fn set<F>(&mut self, name: &str, fields: &[String], query: F) -> Result<()>
    where
        F: FnOnce(&InlineTables) -> Result<View>,
    {
        if self.innermost().contains(name) {
            return Err(ViewError::Redefined(name.to_string()).into());
        }

        let view = query(self)?;
        tracing::debug!("Defined inline table {} ({} records)", name, view.len());
        self.innermost_mut().insert(name, fields, view)?;
        Ok(())
    }

    /// Resolve `name`, innermost scope first
    pub fn get(&self, name: &str) -> Result<View, ViewError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).ok())
            .ok_or_else(|| ViewError::Undefined(name.to_string()))
    }

    /// Define each table in order, stopping at the first failure
    pub fn load<'a>(&mut self, tables: impl IntoIterator<Item = InlineTable<'a>>) -> Result<()> {
        for table in tables {
            self.set(&table.name, &table.fields, table.query)?;
        }
        Ok(())
    }

    fn innermost(&self) -> &InlineTableMap {
        // scopes always holds the root scope
        &self.scopes[self.scopes.len() - 1]
    }

    fn innermost_mut(&mut self) -> &mut InlineTableMap {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}

impl Default for InlineTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn view(rows: &[&str]) -> View {
        View::new(
            vec!["v".to_string()],
            rows.iter().map(|r| vec![r.to_string()]).collect(),
        )
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_copies() {
        let mut tables = InlineTables::new();
        tables.set("Recent", &[], |_| Ok(view(&["a"]))).unwrap();

        let mut copy = tables.get("RECENT").unwrap();
        assert_eq!(copy.name.as_deref(), Some("Recent"));
        copy.records.clear();

        assert_eq!(tables.get("recent").unwrap().len(), 1);
    }

    #[test]
    fn test_redefinition_in_same_scope() {
        let mut tables = InlineTables::new();
        tables.set("t", &[], |_| Ok(view(&["a"]))).unwrap();

        let ran = Cell::new(false);
        let err = tables
            .set("T", &[], |_| {
                ran.set(true);
                Ok(view(&["b"]))
            })
            .unwrap_err();

        assert_eq!(err.downcast_ref::<ViewError>(), Some(&ViewError::Redefined("T".into())));
        assert!(!ran.get());
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let mut tables = InlineTables::new();
        tables.set("t", &[], |_| Ok(view(&["outer"]))).unwrap();

        tables.push_scope();
        tables.set("t", &[], |_| Ok(view(&["inner"]))).unwrap();
        assert_eq!(tables.get("t").unwrap().records[0][0], "inner");

        tables.pop_scope();
        assert_eq!(tables.get("t").unwrap().records[0][0], "outer");
        assert!(tables.pop_scope().is_none());
        assert_eq!(tables.depth(), 1);
    }

    #[test]
    fn test_undefined() {
        let tables = InlineTables::new();
        assert_eq!(tables.get("missing"), Err(ViewError::Undefined("missing".into())));
    }

    #[test]
    fn test_field_length_mismatch() {
        let mut tables = InlineTables::new();
        let fields = vec!["a".to_string(), "b".to_string()];
        let err = tables.set("t", &fields, |_| Ok(view(&["x"]))).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ViewError>(),
            Some(ViewError::FieldLength { expected: 2, actual: 1, .. })
        ));
        assert!(tables.get("t").is_err());
    }

    #[test]
    fn test_load_can_reference_earlier_tables() {
        let mut tables = InlineTables::new();
        let mut source = view(&["1", "2", "3"]);
        source.source = Some("numbers.csv".into());

        tables
            .load([
                InlineTable::new("base", vec!["n".into()], move |_| Ok(source)),
                InlineTable::new("doubled", vec![], |scope: &InlineTables| {
                    let base = scope.get("BASE")?;
                    let records = base
                        .records
                        .iter()
                        .map(|r| -> Result<Vec<String>> {
                            Ok(vec![(r[0].parse::<u32>()? * 2).to_string()])
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(View::new(base.header, records))
                }),
            ])
            .unwrap();

        let base = tables.get("base").unwrap();
        assert_eq!(base.header, vec!["n"]);
        assert!(base.source.is_none());
        assert_eq!(tables.get("doubled").unwrap().records[2][0], "6");
    }

    #[test]
    fn test_load_stops_at_first_error() {
        let mut tables = InlineTables::new();
        let result = tables.load([
            InlineTable::new("a", vec![], |_| anyhow::bail!("query failed")),
            InlineTable::new("b", vec![], |_| Ok(view(&["x"]))),
        ]);

        assert!(result.is_err());
        assert!(tables.get("b").is_err());
    }

    #[test]
    fn test_map_insert_and_get() {
        let mut map = InlineTableMap::new();
        assert!(map.is_empty());
        map.insert("x", &[], view(&["1"])).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.insert("X", &[], view(&["2"])), Err(ViewError::Redefined("X".into())));
        assert!(map.get("x").is_ok());
    }
}
