//! End-to-end statement generation: columns rendered, resolved and quoted.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{named, plain_builder, squash, wp_builder};
use lua_migrate_core::column_type;
use lua_migrate_core::prelude::*;

#[test]
fn test_registry_categories_are_closed() {
    for ty in ColumnType::ALL {
        assert!(column_type::check(ty.tag()));
        assert!(matches!(
            column_type::category(ty.tag()),
            Category::Pk | Category::String | Category::Numeric | Category::Time | Category::Other
        ));
    }
    for unknown in ["", "varchar", "json", "Integer"] {
        assert!(!column_type::check(unknown));
        assert_eq!(column_type::category(unknown), Category::Other);
    }
}

#[test]
fn test_integer_gets_default_length() {
    let sql = plain_builder().add_column("t", "n", &Column::new("integer").to_string());
    assert_eq!(sql, "ALTER TABLE `t` ADD `n` int(12) NOT NULL");
}

#[test]
fn test_pk_ignores_explicit_length() {
    let column = Column::new("pk").with_length(&Value::from(99_i64));
    assert_eq!(column.to_string(), "pk");
    assert_eq!(
        plain_builder().get_column_type(&column.to_string()),
        "int(11) NOT NULL AUTO_INCREMENT PRIMARY KEY"
    );
}

#[test]
fn test_table_prefix_templating() {
    assert_eq!(wp_builder().quote_table_name("{{%demo}}"), "`wp_demo`");
    assert_eq!(plain_builder().quote_table_name("{{%demo}}"), "`demo`");
}

#[test]
fn test_column_type_resolution() {
    let builder = plain_builder();
    assert_eq!(
        builder.get_column_type("pk"),
        "int(11) NOT NULL AUTO_INCREMENT PRIMARY KEY"
    );
    assert_eq!(builder.get_column_type("varchar(100)"), "varchar(100)");
}

#[test]
fn test_create_index_without_unique_keyword() {
    let sql = wp_builder().create_index("uq_test", "{{%test}}", &["name", "state"], false);
    assert!(sql.starts_with("CREATE INDEX "));
    assert!(!sql.contains("UNIQUE"));
    assert_eq!(sql, "CREATE INDEX `uq_test` ON `wp_test` (`name`, `state`)");
}

#[test]
fn test_create_table_from_columns() {
    let columns = [
        named("id", &Column::new("bigpk").unsigned().comment("row id")),
        named(
            "email",
            &Column::from_args("string", &[Value::from(128_i64)]).unique(),
        ),
        named(
            "balance",
            &Column::new("money").default_value("0"),
        ),
        named("bio", &Column::new("text").null()),
        named("created_at", &Column::new("datetime").after("bio")),
        TableColumn::raw("KEY `idx_email` (`email`)"),
    ];
    let sql = wp_builder().create_table("{{%account}}", &columns, Some("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"));

    assert_eq!(
        squash(&sql),
        squash(
            "CREATE TABLE `wp_account` (
                `id` bigint(20) UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY COMMENT \"row id\",
                `email` varchar(128) NOT NULL UNIQUE,
                `balance` decimal(12) NOT NULL DEFAULT 0,
                `bio` text NULL DEFAULT NULL,
                `created_at` datetime NOT NULL AFTER `bio`,
                KEY `idx_email` (`email`)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        )
    );
}

#[test]
fn test_custom_type_map_changes_dialect() {
    let builder = CommandBuilder::new(Quoter::new())
        .with_types(TypeMap::empty().with("pk", "INTEGER PRIMARY KEY AUTOINCREMENT").with("string", "TEXT"));
    let sql = builder.create_table(
        "t",
        &[named("id", &Column::new("pk")), named("name", &Column::new("string"))],
        None,
    );
    assert_eq!(
        sql,
        "CREATE TABLE `t` (\n\t`id` INTEGER PRIMARY KEY AUTOINCREMENT,\n\t`name` TEXT(255) NOT NULL\n)"
    );
}

#[test]
fn test_constraints_round() {
    let builder = wp_builder();
    assert_eq!(
        builder.add_primary_key("pk_user", "{{%user}}", &["id", "tenant"]),
        "ALTER TABLE `wp_user` ADD CONSTRAINT `pk_user` PRIMARY KEY (`id`, `tenant`)"
    );
    assert_eq!(
        builder.drop_primary_key("pk_user", "{{%user}}"),
        "ALTER TABLE `wp_user` DROP CONSTRAINT `pk_user`"
    );
    assert_eq!(
        builder.add_unique("uq_email", "{{%user}}", &["email"]),
        "ALTER TABLE `wp_user` ADD CONSTRAINT `uq_email` UNIQUE (`email`)"
    );
    assert_eq!(
        builder.drop_foreign_key("fk_a", "{{%user}}"),
        "ALTER TABLE `wp_user` DROP CONSTRAINT `fk_a`"
    );
    assert_eq!(builder.drop_index("idx_a", "{{%user}}"), "DROP INDEX `idx_a` ON `wp_user`");
    assert_eq!(builder.truncate_table("{{%user}}"), "TRUNCATE TABLE `wp_user`");
    assert_eq!(builder.drop_table("{{%user}}"), "DROP TABLE `wp_user`");
}

#[test]
fn test_delete_with_array_condition() {
    let condition = Condition::from_value(&Value::from(vec!["age > 18", "state = 'on'"]));
    let sql = plain_builder().delete("user", &condition).unwrap();
    assert_eq!(sql, "DELETE FROM `user` WHERE (age > 18) AND (state = 'on')");
}

#[test]
fn test_delete_with_json_pairs() {
    let condition = Condition::from_value(&Value::from(r#"[{"id": 7}]"#));
    // A plain string is literal SQL, not a parsed array.
    assert!(matches!(condition, Condition::Sql(_)));

    let parsed = Condition::Array(ArrayValue::parse(&Value::from(r#"[{"id": 7}]"#)));
    let sql = plain_builder().delete("user", &parsed).unwrap();
    assert_eq!(sql, "DELETE FROM `user` WHERE `id` = 7");
}

#[test]
fn test_shared_registry_extends_every_builder() {
    #[derive(Debug)]
    struct Between(i64, i64);

    impl Expression for Between {
        fn class(&self) -> &str {
            "Between"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    struct BetweenBuilder;

    impl ExpressionBuilder for BetweenBuilder {
        fn class(&self) -> &str {
            "Between"
        }

        fn build(
            &self,
            expression: &dyn Expression,
            _params: &[Value],
        ) -> lua_migrate_core::Result<BuiltExpression> {
            let between = expression
                .as_any()
                .downcast_ref::<Between>()
                .ok_or_else(|| QueryError::UnknownExpression(expression.class().to_string()))?;
            Ok(BuiltExpression {
                sql: format!("age BETWEEN {} AND {}", between.0, between.1),
                params: Vec::new(),
            })
        }
    }

    let registry = Arc::new(ExpressionRegistry::with_defaults());
    registry.register(Arc::new(BetweenBuilder)).unwrap();

    let builder = plain_builder().with_expressions(Arc::clone(&registry));
    let sql = builder
        .delete("user", &Condition::expression(Between(1, 9)))
        .unwrap();
    assert_eq!(sql, "DELETE FROM `user` WHERE age BETWEEN 1 AND 9");

    let other = wp_builder().with_expressions(registry);
    assert!(other.expressions().contains("Between"));

    let unknown = plain_builder().delete("user", &Condition::expression(Between(1, 2)));
    assert!(matches!(unknown, Err(QueryError::UnknownExpression(_))));
}

#[test]
fn test_batch_insert_escapes_values() {
    let mut extra = BTreeMap::new();
    extra.insert("k".to_string(), Value::from("v"));
    let sql = wp_builder()
        .batch_insert(
            "{{%setting}}",
            &["name", "value", "enabled"],
            &[vec![Value::from("motd"), Value::from("it's on"), Value::Bool(true)]],
        )
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO `wp_setting` (`name`, `value`, `enabled`) VALUES ('motd', 'it''s on', 1)"
    );
    assert_eq!(Value::Map(extra).to_sql_literal(), r#"'{"k":"v"}'"#);
}
