use tablekit::{ColumnOptions, FieldDescriptor, Model};

pub struct TestModel;

impl Model for TestModel {
    const NAME: &'static str = "TestModel";

    fn fields() -> Vec<(&'static str, FieldDescriptor)> {
        vec![
            (
                "id_test",
                FieldDescriptor::uuid(ColumnOptions::new().primary_key().default_expr("gen_random_uuid()")),
            ),
            ("name", FieldDescriptor::string(255, ColumnOptions::new())),
        ]
    }
}

pub struct UserModel;

impl Model for UserModel {
    const NAME: &'static str = "UserModel";

    fn fields() -> Vec<(&'static str, FieldDescriptor)> {
        let text = || FieldDescriptor::string(255, ColumnOptions::new());
        vec![
            (
                "id_user",
                FieldDescriptor::uuid(ColumnOptions::new().primary_key().default_expr("gen_random_uuid()")),
            ),
            ("password", text()),
            ("first_name", text()),
            ("last_name", text()),
            ("gender", text()),
            ("sexual_preference", text()),
            ("test_id", FieldDescriptor::foreign_key("TestModel", "id_test", "UUID")),
            ("test", FieldDescriptor::relationship("test_id")),
        ]
    }
}
