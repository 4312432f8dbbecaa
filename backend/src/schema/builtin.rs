//! Schemas registered at startup.

use serde_json::json;

use super::{FieldSpec, LdapMapping, Schema};
use crate::models::FieldType;

/// User accounts, rendered as `inetOrgPerson` entries.
pub fn user_schema() -> Schema {
    Schema::new("user")
        .description("User data schema")
        .field("id", FieldSpec::new(FieldType::Integer).required())
        .field("name", FieldSpec::new(FieldType::String).required().length(Some(1), Some(100)))
        .field("email", FieldSpec::new(FieldType::Email).required())
        .field("age", FieldSpec::new(FieldType::Integer).range(Some(0.0), Some(150.0)))
        .field("active", FieldSpec::new(FieldType::Boolean).default_value(true))
        .ldap(
            LdapMapping::new("id")
                .naming_attribute("uid")
                .object_classes(["person", "organizationalPerson", "inetOrgPerson"])
                .map("name", "cn")
                .map("email", "mail")
                .surname_from("name"),
        )
}

/// Product catalogue items.
pub fn product_schema() -> Schema {
    Schema::new("product")
        .description("Product data schema")
        .field("id", FieldSpec::new(FieldType::Integer).required())
        .field("name", FieldSpec::new(FieldType::String).required().length(Some(1), Some(200)))
        .field("price", FieldSpec::new(FieldType::Float).required().range(Some(0.0), None))
        .field("category", FieldSpec::new(FieldType::String).required())
        .field("in_stock", FieldSpec::new(FieldType::Boolean).default_value(true))
        .ldap(
            LdapMapping::new("id")
                .naming_attribute("uid")
                .object_classes(["extensibleObject"])
                .map("name", "cn")
                .map("in_stock", "inStock"),
        )
}

/// Payment transactions.
pub fn transaction_schema() -> Schema {
    Schema::new("transaction")
        .description("Transaction data schema")
        .field("transaction_id", FieldSpec::new(FieldType::String).required())
        .field("user_id", FieldSpec::new(FieldType::Integer).required())
        .field("amount", FieldSpec::new(FieldType::Float).required().range(Some(0.0), None))
        .field("timestamp", FieldSpec::new(FieldType::Date).required())
        .field(
            "status",
            FieldSpec::new(FieldType::String)
                .required()
                .choices([json!("pending"), json!("completed"), json!("failed")]),
        )
        .ldap(
            LdapMapping::new("transaction_id")
                .naming_attribute("uid")
                .object_classes(["extensibleObject"])
                .map("user_id", "userId"),
        )
}

pub fn builtin_schemas() -> Vec<Schema> {
    vec![user_schema(), product_schema(), transaction_schema()]
}
