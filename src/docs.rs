//! OpenAPI document for the registered Models: one component schema per Model
//! and the CRUD paths that read and write it.

use crate::model::{FieldDescriptor, FieldKind, ModelDef, ModelRegistry};
use utoipa::openapi::path::{HttpMethod, OperationBuilder, ParameterBuilder, ParameterIn, PathItem};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::schema::{ArrayBuilder, KnownFormat, ObjectBuilder, Schema, SchemaFormat, SchemaType, Type};
use utoipa::openapi::{
    ComponentsBuilder, Content, InfoBuilder, OpenApi, OpenApiBuilder, PathsBuilder, Ref, RefOr, Required, Response,
    ResponseBuilder,
};

const JSON: &str = "application/json";

fn scalar(ty: Type, nullable: bool) -> ObjectBuilder {
    let schema_type = if nullable {
        SchemaType::from_iter([ty, Type::Null])
    } else {
        SchemaType::new(ty)
    };
    ObjectBuilder::new().schema_type(schema_type)
}

fn with_format(builder: ObjectBuilder, format: KnownFormat) -> ObjectBuilder {
    builder.format(Some(SchemaFormat::KnownFormat(format)))
}

/// Foreign-key columns are described by their declared SQL type.
fn foreign_key_schema(d: &FieldDescriptor) -> ObjectBuilder {
    let sql_type = d.sql_type().to_uppercase();
    if sql_type.contains("UUID") {
        with_format(scalar(Type::String, true), KnownFormat::Uuid)
    } else if sql_type.contains("BIGINT") || sql_type.contains("BIGSERIAL") || sql_type.contains("INT8") {
        with_format(scalar(Type::Integer, true), KnownFormat::Int64)
    } else if sql_type.contains("INT") || sql_type.contains("SERIAL") {
        with_format(scalar(Type::Integer, true), KnownFormat::Int32)
    } else {
        scalar(Type::String, true)
    }
}

fn field_schema(registry: &ModelRegistry, model: &ModelDef, d: &FieldDescriptor) -> Option<RefOr<Schema>> {
    let nullable = d.nullable();
    let builder = match d.kind() {
        FieldKind::String => scalar(Type::String, nullable).max_length(d.max_length().map(|n| n as usize)),
        FieldKind::Integer => with_format(scalar(Type::Integer, nullable), KnownFormat::Int32),
        FieldKind::Float => with_format(scalar(Type::Number, nullable), KnownFormat::Double),
        FieldKind::Boolean => scalar(Type::Boolean, nullable),
        FieldKind::Date => with_format(scalar(Type::String, nullable), KnownFormat::Date),
        FieldKind::Uuid => with_format(scalar(Type::String, nullable), KnownFormat::Uuid),
        FieldKind::ForeignKey => foreign_key_schema(d),
        FieldKind::Relationship => {
            let related = registry.related_model(model, d).ok()?;
            return Some(RefOr::Ref(Ref::from_schema_name(related.table())));
        }
    };
    Some(RefOr::T(Schema::Object(builder.build())))
}

fn model_schema(registry: &ModelRegistry, model: &ModelDef) -> Schema {
    let mut object = ObjectBuilder::new().schema_type(SchemaType::new(Type::Object));
    for (name, d) in model.fields() {
        let Some(schema) = field_schema(registry, model, d) else { continue };
        object = object.property(name, schema);
        if d.is_stored() && !d.nullable() && !d.has_default() {
            object = object.required(name);
        }
    }
    Schema::Object(object.build())
}

/// `{data: <payload>}`, the envelope every successful entity response uses.
fn envelope(data: impl Into<RefOr<Schema>>) -> Content {
    let object = ObjectBuilder::new()
        .schema_type(SchemaType::new(Type::Object))
        .property("data", data)
        .required("data");
    Content::new(Some(object))
}

fn json_response(description: &str, content: Content) -> Response {
    ResponseBuilder::new().description(description).content(JSON, content).build()
}

fn model_paths(model: &ModelDef) -> Vec<(String, PathItem)> {
    let table = model.table();
    let row = || Ref::from_schema_name(table);

    let create = OperationBuilder::new()
        .tag(table)
        .summary(Some(format!("Create a {} row", table)))
        .request_body(Some(
            RequestBodyBuilder::new()
                .content(JSON, Content::new(Some(row())))
                .required(Some(Required::True))
                .build(),
        ))
        .response("201", json_response("Row as stored", envelope(row())))
        .response("400", Response::new("Unknown field or malformed body"))
        .response("422", Response::new("Value cannot be converted for its column"));

    let list = OperationBuilder::new()
        .tag(table)
        .summary(Some(format!("List {} rows", table)))
        .response(
            "200",
            json_response("Every row, ordered by primary key", envelope(ArrayBuilder::new().items(row()))),
        );

    let read = OperationBuilder::new()
        .tag(table)
        .summary(Some(format!("Read one {} row by primary key", table)))
        .parameter(
            ParameterBuilder::new()
                .name("id")
                .parameter_in(ParameterIn::Path)
                .required(Required::True)
                .schema(Some(scalar(Type::String, false))),
        )
        .response("200", json_response("Row with relationships resolved", envelope(row())))
        .response("404", Response::new("No row with that key"))
        .response("422", Response::new("Key cannot be converted for the primary-key column"));

    let mut collection = PathItem::new(HttpMethod::Post, create);
    collection.merge_operations(PathItem::new(HttpMethod::Get, list));
    vec![
        (format!("/{}", table), collection),
        (format!("/{}/{{id}}", table), PathItem::new(HttpMethod::Get, read)),
    ]
}

fn health_path() -> PathItem {
    let msg = || {
        let object = ObjectBuilder::new()
            .schema_type(SchemaType::new(Type::Object))
            .property("msg", scalar(Type::String, false))
            .required("msg");
        Content::new(Some(object))
    };
    PathItem::new(
        HttpMethod::Get,
        OperationBuilder::new()
            .tag("health")
            .summary(Some("Database health"))
            .response("200", json_response("Database reachable", msg()))
            .response("400", json_response("Database unreachable", msg())),
    )
}

/// One component schema per Model, keyed by table name, plus `/health` and the
/// create, list and read paths of every Model.
pub fn openapi(registry: &ModelRegistry, title: &str, version: &str) -> OpenApi {
    let mut components = ComponentsBuilder::new();
    let mut paths = PathsBuilder::new().path("/health", health_path());
    for model in registry.all_models() {
        components = components.schema(model.table(), model_schema(registry, model));
        for (path, item) in model_paths(model) {
            paths = paths.path(path, item);
        }
    }
    OpenApiBuilder::new()
        .info(InfoBuilder::new().title(title).version(version).build())
        .paths(paths)
        .components(Some(components.build()))
        .build()
}
