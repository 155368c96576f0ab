//! Model definitions and the registry the schema builder and CRUD engine read from.

use crate::case::table_name_for;
use crate::error::ConfigError;
use crate::model::field::{FieldDescriptor, FieldKind};
use crate::sql::{is_valid_sql_type, validate_identifier};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Declares a Model type. Registered explicitly with [`ModelRegistry::register`].
///
/// ```ignore
/// struct TestModel;
///
/// impl Model for TestModel {
///     const NAME: &'static str = "TestModel";
///
///     fn fields() -> Vec<(&'static str, FieldDescriptor)> {
///         vec![
///             ("id_test", FieldDescriptor::uuid(ColumnOptions::new().primary_key())),
///             ("name", FieldDescriptor::string(255, ColumnOptions::new())),
///         ]
///     }
/// }
/// ```
pub trait Model {
    const NAME: &'static str;

    /// Fields in column order.
    fn fields() -> Vec<(&'static str, FieldDescriptor)>;
}

/// One registered Model: name, table and ordered field descriptors.
#[derive(Debug)]
pub struct ModelDef {
    name: String,
    table: String,
    fields: Vec<(String, FieldDescriptor)>,
    index: HashMap<String, usize>,
}

impl ModelDef {
    pub fn new<N: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (N, FieldDescriptor)>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let table = table_name_for(&name);
        let mut ordered = Vec::new();
        let mut index = HashMap::new();
        for (field_name, descriptor) in fields {
            let field_name = field_name.into();
            if index.insert(field_name.clone(), ordered.len()).is_some() {
                return Err(ConfigError::DuplicateField {
                    model: name,
                    field: field_name,
                });
            }
            ordered.push((field_name, descriptor));
        }
        Ok(ModelDef {
            name,
            table,
            fields: ordered,
            index,
        })
    }

    pub fn of<M: Model>() -> Result<Self, ConfigError> {
        Self::new(M::NAME, M::fields())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every field in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    /// Fields backed by a column, in column order. Row decoding is positional over this list.
    pub fn stored_fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields().filter(|(_, d)| d.is_stored())
    }

    pub fn relationship_fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields().filter(|(_, d)| !d.is_stored())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i].1)
    }
}

/// All registered Models, keyed by table name.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    by_table: BTreeMap<String, Arc<ModelDef>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Model>(&mut self) -> Result<Arc<ModelDef>, ConfigError> {
        self.register_def(ModelDef::of::<M>()?)
    }

    pub fn register_def(&mut self, def: ModelDef) -> Result<Arc<ModelDef>, ConfigError> {
        if self.by_table.contains_key(def.table()) {
            return Err(ConfigError::DuplicateModel(def.name().to_string()));
        }
        let def = Arc::new(def);
        self.by_table.insert(def.table().to_string(), Arc::clone(&def));
        Ok(def)
    }

    /// Every Model exactly once, ordered by table name.
    pub fn all_models(&self) -> impl Iterator<Item = &Arc<ModelDef>> {
        self.by_table.values()
    }

    /// Ordered field descriptors of a Model.
    pub fn fields_of<'a>(&self, model: &'a ModelDef) -> Vec<(&'a str, &'a FieldDescriptor)> {
        model.fields().collect()
    }

    pub fn get(&self, table: &str) -> Option<&Arc<ModelDef>> {
        self.by_table.get(table)
    }

    pub fn len(&self) -> usize {
        self.by_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_table.is_empty()
    }

    /// Model a relationship field resolves to: the target of the local foreign key named by its join field.
    pub fn related_model(&self, model: &ModelDef, relationship: &FieldDescriptor) -> Result<&Arc<ModelDef>, ConfigError> {
        let join_field = relationship.join_field().unwrap_or_default();
        let target = model
            .stored_fields()
            .find(|(name, d)| *name == join_field && d.kind() == FieldKind::ForeignKey)
            .and_then(|(_, d)| d.references())
            .ok_or_else(|| ConfigError::InvalidJoinField {
                model: model.name().to_string(),
                field: join_field.to_string(),
                join_field: join_field.to_string(),
            })?;
        self.get(&target.table).ok_or_else(|| ConfigError::MissingReference {
            kind: "model",
            id: target.table.clone(),
        })
    }

    /// Checks the registered set as a whole: identifiers, foreign-key targets,
    /// relationship join fields and relationship cycles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |id: &str| ConfigError::InvalidIdentifier(id.to_string());
        for model in self.all_models() {
            validate_identifier(model.table()).map_err(|_| invalid(model.table()))?;
            for (name, d) in model.fields() {
                validate_identifier(name).map_err(|_| invalid(name))?;
                if d.is_stored() && !is_valid_sql_type(d.sql_type()) {
                    return Err(ConfigError::InvalidSqlType {
                        field: format!("{}.{}", model.table(), name),
                        sql_type: d.sql_type().to_string(),
                    });
                }
                match d.kind() {
                    FieldKind::ForeignKey => {
                        let target = d.references().ok_or_else(|| ConfigError::MissingReference {
                            kind: "foreign key target",
                            id: format!("{}.{}", model.table(), name),
                        })?;
                        let target_model = self.get(&target.table).ok_or_else(|| ConfigError::MissingReference {
                            kind: "model",
                            id: target.table.clone(),
                        })?;
                        let stored = target_model.field(&target.column).map(|f| f.is_stored()).unwrap_or(false);
                        if !stored {
                            return Err(ConfigError::MissingReference {
                                kind: "column",
                                id: format!("{}.{}", target.table, target.column),
                            });
                        }
                    }
                    FieldKind::Relationship => {
                        let join_field = d.join_field().unwrap_or_default();
                        let is_fk = model
                            .field(join_field)
                            .map(|f| f.kind() == FieldKind::ForeignKey)
                            .unwrap_or(false);
                        if !is_fk {
                            return Err(ConfigError::InvalidJoinField {
                                model: model.name().to_string(),
                                field: name.to_string(),
                                join_field: join_field.to_string(),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        self.check_relationship_cycles()
    }

    fn check_relationship_cycles(&self) -> Result<(), ConfigError> {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
        for model in self.all_models() {
            for (_, rel) in model.relationship_fields() {
                let related = self.related_model(model, rel)?;
                edges.entry(model.table()).or_default().push(related.table());
            }
        }
        let mut done: HashSet<&str> = HashSet::new();
        for start in self.by_table.keys() {
            let mut path = Vec::new();
            visit(start, &edges, &mut path, &mut done)?;
        }
        Ok(())
    }
}

fn visit<'a>(
    table: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Result<(), ConfigError> {
    if let Some(pos) = path.iter().position(|t| *t == table) {
        let mut cycle: Vec<&str> = path[pos..].to_vec();
        cycle.push(table);
        return Err(ConfigError::RelationshipCycle(cycle.join(" -> ")));
    }
    if done.contains(table) {
        return Ok(());
    }
    path.push(table);
    for next in edges.get(table).map(Vec::as_slice).unwrap_or(&[]) {
        visit(*next, edges, path, done)?;
    }
    path.pop();
    done.insert(table);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field::ColumnOptions;

    struct TestModel;

    impl Model for TestModel {
        const NAME: &'static str = "TestModel";

        fn fields() -> Vec<(&'static str, FieldDescriptor)> {
            vec![
                ("id_test", FieldDescriptor::uuid(ColumnOptions::new().primary_key())),
                ("name", FieldDescriptor::string(255, ColumnOptions::new())),
            ]
        }
    }

    struct UserModel;

    impl Model for UserModel {
        const NAME: &'static str = "UserModel";

        fn fields() -> Vec<(&'static str, FieldDescriptor)> {
            vec![
                ("id_user", FieldDescriptor::uuid(ColumnOptions::new().primary_key())),
                ("first_name", FieldDescriptor::string(255, ColumnOptions::new())),
                ("test_id", FieldDescriptor::foreign_key("TestModel", "id_test", "UUID")),
                ("test", FieldDescriptor::relationship("test_id")),
            ]
        }
    }

    #[test]
    fn registration_order_does_not_matter() {
        let mut a = ModelRegistry::new();
        a.register::<UserModel>().unwrap();
        a.register::<TestModel>().unwrap();
        let mut b = ModelRegistry::new();
        b.register::<TestModel>().unwrap();
        b.register::<UserModel>().unwrap();
        let tables = |r: &ModelRegistry| r.all_models().map(|m| m.table().to_string()).collect::<Vec<_>>();
        assert_eq!(tables(&a), vec!["test", "user"]);
        assert_eq!(tables(&a), tables(&b));
        a.validate().unwrap();
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut r = ModelRegistry::new();
        r.register::<TestModel>().unwrap();
        assert!(matches!(r.register::<TestModel>(), Err(ConfigError::DuplicateModel(_))));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn fields_keep_declaration_order() {
        let mut r = ModelRegistry::new();
        let user = r.register::<UserModel>().unwrap();
        let names: Vec<&str> = r.fields_of(&user).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id_user", "first_name", "test_id", "test"]);
        let stored: Vec<&str> = user.stored_fields().map(|(n, _)| n).collect();
        assert_eq!(stored, vec!["id_user", "first_name", "test_id"]);
    }

    #[test]
    fn invalid_column_name_rejected() {
        let mut r = ModelRegistry::new();
        r.register_def(
            ModelDef::new("EvilModel", vec![("name; DROP", FieldDescriptor::integer(ColumnOptions::new()))]).unwrap(),
        )
        .unwrap();
        assert!(matches!(r.validate(), Err(ConfigError::InvalidIdentifier(id)) if id == "name; DROP"));
    }

    #[test]
    fn foreign_key_column_type_is_checked() {
        let mut r = ModelRegistry::new();
        r.register::<TestModel>().unwrap();
        r.register_def(
            ModelDef::new(
                "SneakyModel",
                vec![
                    ("id", FieldDescriptor::integer(ColumnOptions::new().primary_key())),
                    ("test_id", FieldDescriptor::foreign_key("TestModel", "id_test", "UUID); DROP TABLE test; --")),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        match r.validate() {
            Err(ConfigError::InvalidSqlType { field, .. }) => assert_eq!(field, "sneaky.test_id"),
            other => panic!("expected type rejection, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_field_rejected() {
        let err = ModelDef::new(
            "DupModel",
            vec![
                ("a", FieldDescriptor::integer(ColumnOptions::new())),
                ("a", FieldDescriptor::integer(ColumnOptions::new())),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateField { .. }));
    }

    #[test]
    fn dangling_foreign_key_target() {
        let mut r = ModelRegistry::new();
        r.register::<UserModel>().unwrap();
        assert!(matches!(
            r.validate(),
            Err(ConfigError::MissingReference { kind: "model", .. })
        ));
    }

    #[test]
    fn relationship_must_join_on_foreign_key() {
        let mut r = ModelRegistry::new();
        r.register_def(
            ModelDef::new(
                "BadModel",
                vec![
                    ("id", FieldDescriptor::integer(ColumnOptions::new().primary_key())),
                    ("other", FieldDescriptor::relationship("id")),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        assert!(matches!(r.validate(), Err(ConfigError::InvalidJoinField { .. })));
    }

    #[test]
    fn relationship_cycle_detected() {
        let mut r = ModelRegistry::new();
        r.register_def(
            ModelDef::new(
                "AModel",
                vec![
                    ("id", FieldDescriptor::integer(ColumnOptions::new().primary_key())),
                    ("b_id", FieldDescriptor::foreign_key("b", "id", "INTEGER")),
                    ("b", FieldDescriptor::relationship("b_id")),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        r.register_def(
            ModelDef::new(
                "BModel",
                vec![
                    ("id", FieldDescriptor::integer(ColumnOptions::new().primary_key())),
                    ("a_id", FieldDescriptor::foreign_key("a", "id", "INTEGER")),
                    ("a", FieldDescriptor::relationship("a_id")),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        match r.validate() {
            Err(ConfigError::RelationshipCycle(path)) => assert_eq!(path, "a -> b -> a"),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn mutual_foreign_keys_without_relationships_are_fine() {
        let mut r = ModelRegistry::new();
        r.register_def(
            ModelDef::new(
                "AModel",
                vec![
                    ("id", FieldDescriptor::integer(ColumnOptions::new().primary_key())),
                    ("b_id", FieldDescriptor::foreign_key("b", "id", "INTEGER")),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        r.register_def(
            ModelDef::new(
                "BModel",
                vec![
                    ("id", FieldDescriptor::integer(ColumnOptions::new().primary_key())),
                    ("a_id", FieldDescriptor::foreign_key("a", "id", "INTEGER")),
                ],
            )
            .unwrap(),
        )
        .unwrap();
        r.validate().unwrap();
    }

    #[test]
    fn related_model_follows_join_field() {
        let mut r = ModelRegistry::new();
        r.register::<TestModel>().unwrap();
        let user = r.register::<UserModel>().unwrap();
        let rel = user.field("test").unwrap();
        assert_eq!(r.related_model(&user, rel).unwrap().table(), "test");
    }
}
