//! Integration tests for part serialization.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use openapi_part::{
    schema, schema_of, schema_with_format, Accessor, CollectionFormat, DataType, Format,
    PartConfig, PartConvertible, PartError, PartSerializer, PartValue, SchemaNode,
    SchemaValidationError,
};

fn serialize(ps: &SchemaNode, value: impl Into<PartValue>) -> Result<String, PartError> {
    PartSerializer::new().serialize(ps, &value.into())
}

fn message(result: Result<String, PartError>) -> String {
    result.unwrap_err().to_string()
}

// === Null Handling ===

mod nulls {
    use super::*;

    #[test]
    fn optional_null_is_literal() {
        for ps in [
            schema().build().unwrap(),
            schema_of(DataType::String).build().unwrap(),
            schema_of(DataType::Integer).build().unwrap(),
            schema_of(DataType::Array).build().unwrap(),
            schema_with_format(DataType::String, Format::Byte).build().unwrap(),
        ] {
            assert_eq!(serialize(&ps, PartValue::Null).unwrap(), "null");
        }
    }

    #[test]
    fn required_null_fails() {
        for ps in [
            schema().required(true).build().unwrap(),
            schema_of(DataType::Boolean).required(true).build().unwrap(),
            schema_of(DataType::Object).required(true).build().unwrap(),
        ] {
            assert_eq!(
                message(serialize(&ps, PartValue::Null)),
                "Required value not provided."
            );
        }
    }

    #[test]
    fn required_null_element_fails() {
        let ps = schema_of(DataType::Array)
            .items(schema_of(DataType::String).required(true))
            .build()
            .unwrap();
        let err = serialize(&ps, PartValue::list([Some("a"), None])).unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&SchemaValidationError::RequiredValueNotProvided)
        );
    }
}

// === String Constraints ===

mod constraints {
    use super::*;

    #[test]
    fn pattern() {
        let ps = schema().pattern("x.*").build().unwrap();
        assert_eq!(serialize(&ps, "x").unwrap(), "x");
        assert_eq!(serialize(&ps, "xx").unwrap(), "xx");
        assert_eq!(
            message(serialize(&ps, "y")),
            "Value does not match expected pattern.  Must match pattern: x.*"
        );
    }

    #[test]
    fn enum_values() {
        let ps = schema_of(DataType::String)
            .enum_values(["foo", "bar"])
            .build()
            .unwrap();
        assert_eq!(serialize(&ps, "bar").unwrap(), "bar");
        assert_eq!(
            message(serialize(&ps, "baz")),
            "Value does not match one of the expected values.  Must be one of the following: foo, bar"
        );
    }

    #[test]
    fn enum_applies_to_string_form_of_numbers() {
        let ps = schema_of(DataType::Integer)
            .enum_values(["1", "2"])
            .build()
            .unwrap();
        assert_eq!(serialize(&ps, 2).unwrap(), "2");
        assert!(serialize(&ps, 3).is_err());
    }

    #[test]
    fn empty_value() {
        let ps = schema_of(DataType::String).build().unwrap();
        assert_eq!(message(serialize(&ps, "")), "Empty value not allowed.");

        let ps = schema_of(DataType::String)
            .allow_empty_value(true)
            .build()
            .unwrap();
        assert_eq!(serialize(&ps, "").unwrap(), "");
    }

    #[test]
    fn lengths() {
        let ps = schema().min_length(2).max_length(3).build().unwrap();
        assert_eq!(
            message(serialize(&ps, "a")),
            "Minimum length of value not met."
        );
        assert_eq!(serialize(&ps, "abc").unwrap(), "abc");
        assert_eq!(
            message(serialize(&ps, "abcd")),
            "Maximum length of value exceeded."
        );
    }

    #[test]
    fn numeric_bounds() {
        let ps = schema_of(DataType::Integer)
            .minimum(5.0)
            .maximum(10.0)
            .build()
            .unwrap();
        assert_eq!(message(serialize(&ps, 3)), "Minimum value not met.");
        assert_eq!(message(serialize(&ps, 11)), "Maximum value exceeded.");
        assert_eq!(serialize(&ps, 7).unwrap(), "7");
    }

    #[test]
    fn item_counts() {
        let ps = schema_of(DataType::Array)
            .max_items(2)
            .unique_items(true)
            .build()
            .unwrap();
        assert_eq!(
            message(serialize(&ps, PartValue::list(["a", "b", "c"]))),
            "Maximum number of items exceeded."
        );
        assert_eq!(
            message(serialize(&ps, PartValue::list(["a", "a"]))),
            "Duplicate items not allowed."
        );
    }

    #[test]
    fn validation_errors_map_to_bad_request() {
        let ps = schema().pattern("x.*").build().unwrap();
        assert_eq!(serialize(&ps, "y").unwrap_err().status_code(), 400);

        let ps = schema_of(DataType::File).build().unwrap();
        assert_eq!(serialize(&ps, "y").unwrap_err().status_code(), 500);
    }
}

// === Scalars ===

mod scalars {
    use super::*;

    #[test]
    fn keyword_strings_quote_only_in_uon() {
        let plain = schema_of(DataType::String).build().unwrap();
        assert_eq!(serialize(&plain, "true").unwrap(), "true");

        let uon = schema_with_format(DataType::String, Format::Uon).build().unwrap();
        assert_eq!(serialize(&uon, "true").unwrap(), "'true'");
        assert_eq!(serialize(&uon, "null").unwrap(), "'null'");
        assert_eq!(serialize(&uon, "123").unwrap(), "'123'");
        assert_eq!(serialize(&uon, "abc").unwrap(), "abc");
    }

    #[test]
    fn byte_format_is_base64() {
        let ps = schema_with_format(DataType::String, Format::Byte).build().unwrap();
        assert_eq!(serialize(&ps, &b"foo"[..]).unwrap(), "Zm9v");
        assert_eq!(serialize(&ps, PartValue::Null).unwrap(), "null");
    }

    #[test]
    fn dates() {
        let ps = schema_with_format(DataType::String, Format::Date).build().unwrap();
        let date = NaiveDate::from_ymd_opt(2012, 12, 21).unwrap();
        assert_eq!(serialize(&ps, date).unwrap(), "2012-12-21");

        let ps = schema_with_format(DataType::String, Format::DateTime)
            .build()
            .unwrap();
        let dt = Utc.with_ymd_and_hms(2012, 12, 21, 12, 34, 56).unwrap();
        assert_eq!(serialize(&ps, dt).unwrap(), "2012-12-21T12:34:56Z");
        assert_eq!(serialize(&ps, date).unwrap(), "2012-12-21T00:00:00Z");
    }

    #[test]
    fn booleans_and_numbers() {
        let ps = schema_of(DataType::Boolean).build().unwrap();
        assert_eq!(serialize(&ps, "TRUE").unwrap(), "true");
        assert!(matches!(
            serialize(&ps, "yes"),
            Err(PartError::Conversion(_))
        ));

        let ps = schema_of(DataType::Number).build().unwrap();
        assert_eq!(serialize(&ps, 1.5f64).unwrap(), "1.5");
        assert_eq!(serialize(&ps, 2).unwrap(), "2");

        let ps = schema_with_format(DataType::Number, Format::Double).build().unwrap();
        assert_eq!(serialize(&ps, "0.25").unwrap(), "0.25");
    }

    #[test]
    fn untyped_values_keep_their_shape() {
        let ps = schema().build().unwrap();
        assert_eq!(serialize(&ps, true).unwrap(), "true");
        assert_eq!(serialize(&ps, 10_000_000_000i64).unwrap(), "10000000000");
        assert_eq!(serialize(&ps, &b"foo"[..]).unwrap(), "Zm9v");
        assert_eq!(serialize(&ps, PartValue::list(["a", "b"])).unwrap(), "a,b");
    }
}

// === Arrays ===

mod arrays {
    use super::*;

    #[test]
    fn csv() {
        let ps = schema_of(DataType::Array)
            .collection_format(CollectionFormat::Csv)
            .build()
            .unwrap();
        assert_eq!(
            serialize(&ps, PartValue::list([Some("foo"), Some("bar"), None])).unwrap(),
            "foo,bar,null"
        );
        assert_eq!(
            serialize(&ps, PartValue::list([Some("foo,bar"), None])).unwrap(),
            "foo\\,bar,null"
        );
    }

    #[test]
    fn nested_pipes() {
        let ps = schema_of(DataType::Array)
            .collection_format(CollectionFormat::Pipes)
            .items(schema_of(DataType::Array).items(schema_of(DataType::Integer)))
            .build()
            .unwrap();
        let value = PartValue::list([
            PartValue::list([1, 2]),
            PartValue::list([3]),
            PartValue::Null,
        ]);
        assert_eq!(serialize(&ps, value).unwrap(), "1,2|3|null");
    }

    #[test]
    fn three_dimensional() {
        let ps = schema_of(DataType::Array)
            .collection_format(CollectionFormat::Ssv)
            .items(
                schema_of(DataType::Array)
                    .collection_format(CollectionFormat::Pipes)
                    .items(schema_of(DataType::Array).items(schema_of(DataType::Integer))),
            )
            .build()
            .unwrap();
        let value = PartValue::list([
            PartValue::list([PartValue::list([1, 2]), PartValue::list([3])]),
            PartValue::list([PartValue::list([4])]),
        ]);
        assert_eq!(serialize(&ps, value).unwrap(), "1,2|3 4");
    }

    #[test]
    fn uon_collection_format() {
        let ps = schema_of(DataType::Array)
            .collection_format(CollectionFormat::Uon)
            .items(schema())
            .build()
            .unwrap();
        let value = PartValue::list([
            PartValue::from("a"),
            PartValue::from(1),
            PartValue::from("1"),
            PartValue::Null,
        ]);
        assert_eq!(serialize(&ps, value).unwrap(), "@(a,1,'1',null)");
    }

    #[test]
    fn uon_format_encodes_whole_value() {
        let ps = schema_with_format(DataType::Array, Format::Uon).build().unwrap();
        let value = PartValue::list([PartValue::from("x y"), PartValue::from(true)]);
        assert_eq!(serialize(&ps, value).unwrap(), "@('x y',true)");
    }

    #[test]
    fn element_constraints_apply() {
        let ps = schema_of(DataType::Array)
            .items(schema_of(DataType::String).pattern("[a-z]+"))
            .build()
            .unwrap();
        assert!(serialize(&ps, PartValue::list(["abc", "def"])).is_ok());
        assert!(serialize(&ps, PartValue::list(["abc", "123"])).is_err());
    }

    #[test]
    fn string_value_becomes_single_element() {
        let ps = schema_of(DataType::Array).build().unwrap();
        assert_eq!(serialize(&ps, "solo").unwrap(), "solo");
        assert_eq!(serialize(&ps, "@(a,b)").unwrap(), "a,b");
    }

    #[test]
    fn leading_uon_marker() {
        let value = PartValue::list(["@(a)", "b"]);
        let ps = schema_of(DataType::Array)
            .collection_format(CollectionFormat::Csv)
            .build()
            .unwrap();
        assert_eq!(serialize(&ps, value.clone()).unwrap(), "@(a),b");

        let ps = schema_of(DataType::Array).build().unwrap();
        assert_eq!(serialize(&ps, value).unwrap(), "\\@(a),b");
    }
}

// === Objects ===

mod objects {
    use super::*;

    #[test]
    fn default_is_uon() {
        let ps = schema_of(DataType::Object)
            .property("a", schema_of(DataType::Integer))
            .build()
            .unwrap();
        let value = PartValue::map([
            ("a", PartValue::from(1)),
            ("b", PartValue::from("x")),
            ("c", PartValue::from("true")),
        ]);
        assert_eq!(serialize(&ps, value).unwrap(), "(a=1,b=x,c='true')");
    }

    #[test]
    fn key_value_pairs() {
        let ps = schema_of(DataType::Object)
            .collection_format(CollectionFormat::Csv)
            .build()
            .unwrap();
        let value = PartValue::map([("a", "1"), ("b", "x,y")]);
        assert_eq!(serialize(&ps, value).unwrap(), "a=1,b=x\\,y");
    }

    #[test]
    fn property_constraints() {
        let ps = schema_of(DataType::Object)
            .property("id", schema_of(DataType::Integer).maximum(10.0))
            .additional_properties(schema_of(DataType::String).max_length(2))
            .max_properties(2)
            .build()
            .unwrap();
        assert!(serialize(&ps, PartValue::map([("id", 11)])).is_err());
        assert!(serialize(&ps, PartValue::map([("x", "abc")])).is_err());
        assert_eq!(
            message(serialize(
                &ps,
                PartValue::map([("a", "1"), ("b", "2"), ("c", "3")])
            )),
            "Maximum number of properties exceeded."
        );
    }

    #[test]
    fn required_property_must_be_present() {
        let ps = schema_of(DataType::Object)
            .property("id", schema_of(DataType::Integer).required(true))
            .property("name", schema_of(DataType::String))
            .build()
            .unwrap();
        assert_eq!(
            message(serialize(&ps, PartValue::map([("name", "x")]))),
            "Required value not provided."
        );
        assert_eq!(
            serialize(&ps, PartValue::map([("id", 1)])).unwrap(),
            "(id=1)"
        );
    }

    #[test]
    fn keys_are_escaped() {
        let ps = schema_of(DataType::Object)
            .collection_format(CollectionFormat::Pipes)
            .build()
            .unwrap();
        let value = PartValue::map([("a=b", "1"), ("c|d", "2")]);
        assert_eq!(serialize(&ps, value).unwrap(), "a\\\\=b=1|c\\|d=2");
    }
}

// === Configuration and Custom Types ===

mod extension {
    use super::*;

    #[derive(Debug)]
    struct Checksum([u8; 3]);

    impl fmt::Display for Checksum {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "checksum")
        }
    }

    impl PartConvertible for Checksum {
        fn type_name(&self) -> &'static str {
            "Checksum"
        }

        fn accessors(&self) -> &'static [Accessor] {
            &[Accessor::ByteArray]
        }

        fn to_byte_array(&self) -> Option<Vec<u8>> {
            Some(self.0.to_vec())
        }
    }

    #[test]
    fn accessor_feeds_byte_format() {
        let ps = schema_with_format(DataType::String, Format::Byte).build().unwrap();
        let value = PartValue::object(Checksum(*b"foo"));
        assert_eq!(serialize(&ps, value.clone()).unwrap(), "Zm9v");

        let ps = schema_with_format(DataType::String, Format::BinarySpaced)
            .build()
            .unwrap();
        assert_eq!(serialize(&ps, value.clone()).unwrap(), "66 6f 6f");

        let ps = schema_of(DataType::String).build().unwrap();
        assert_eq!(serialize(&ps, value).unwrap(), "checksum");
    }

    #[test]
    fn config_supplies_defaults() {
        let serializer = PartSerializer::with_config(
            PartConfig::new().collection_format(CollectionFormat::Pipes),
        );
        let ps = schema_of(DataType::Array).build().unwrap();
        assert_eq!(
            serializer
                .serialize(&ps, &PartValue::list(["a", "b"]))
                .unwrap(),
            "a|b"
        );

        let ps = schema_of(DataType::Array)
            .collection_format(CollectionFormat::Ssv)
            .build()
            .unwrap();
        assert_eq!(
            serializer
                .serialize(&ps, &PartValue::list(["a", "b"]))
                .unwrap(),
            "a b"
        );
    }

    #[test]
    fn serializer_is_shareable_across_threads() {
        let serializer = Arc::new(PartSerializer::new());
        let ps = Arc::new(
            schema_of(DataType::Array)
                .items(schema_of(DataType::Integer))
                .build()
                .unwrap(),
        );
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let serializer = Arc::clone(&serializer);
                let ps = Arc::clone(&ps);
                std::thread::spawn(move || {
                    serializer
                        .serialize(&ps, &PartValue::list([i, i + 1]))
                        .unwrap()
                })
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), format!("{},{}", i, i + 1));
        }
        assert!(serializer.config().conversions().cached_strategies() > 0);
    }
}
