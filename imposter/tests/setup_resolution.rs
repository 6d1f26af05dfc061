// vim: tw=80
//! Choosing which setup handles an invocation, and what happens when none
//! does
#![deny(warnings)]

use std::{sync::Arc, thread};

use imposter::*;

mod resolution {
    use super::*;

    #[test]
    fn newest_matching_setup_wins() {
        let mock = Mock::new();
        mock.setup_method::<u32>("f", Param::any::<i32>()).returns(1);
        mock.setup_method::<u32>("f", Param::eq(5i32)).returns(2);
        assert_eq!(2, mock.call::<u32>("f", vec![Value::new(5i32)]).unwrap());
        assert_eq!(1, mock.call::<u32>("f", vec![Value::new(6i32)]).unwrap());

        mock.setup_method::<u32>("f", Param::any::<i32>()).returns(3);
        assert_eq!(3, mock.call::<u32>("f", vec![Value::new(5i32)]).unwrap());
    }

    #[test]
    fn overloads_by_argument_type() {
        let mock = Mock::new();
        mock.setup_method::<&'static str>("f", Param::any::<u32>())
            .returns("u32");
        mock.setup_method::<&'static str>("f", Param::any::<String>())
            .returns("string");
        let s = mock.call::<&str>("f", vec![Value::new("x".to_owned())]);
        assert_eq!("string", s.unwrap());
        let s = mock.call::<&str>("f", vec![Value::new(1u32)]);
        assert_eq!("u32", s.unwrap());
    }

    #[test]
    fn overloads_by_arity() {
        let mock = Mock::new();
        mock.setup_method::<u8>("f", Parameters::none()).returns(0);
        mock.setup_method::<u8>("f", Param::any::<u8>()).returns(1);
        mock.setup_method::<u8>("f", [Param::any::<u8>(), Param::any::<u8>()])
            .returns(2);
        let args = |n: u8| (0..n).map(Value::new).collect::<Vec<_>>();
        assert_eq!(0, mock.call::<u8>("f", args(0)).unwrap());
        assert_eq!(1, mock.call::<u8>("f", args(1)).unwrap());
        assert_eq!(2, mock.call::<u8>("f", args(2)).unwrap());
    }

    #[test]
    fn other_members_do_not_match() {
        let mock = Mock::new();
        mock.setup_method::<u8>("f", Parameters::Any).returns(9);
        assert_eq!(0, mock.call::<u8>("g", vec![]).unwrap());
    }

    #[test]
    fn match_count() {
        let mock = Mock::new();
        let setup = mock.setup_method::<()>("f", Parameters::Any)
            .setup()
            .clone();
        for _ in 0..3 {
            mock.call::<()>("f", vec![]).unwrap();
        }
        assert_eq!(3, setup.match_count());
    }

    #[test]
    fn concurrent_matches_are_counted_once_each() {
        let mock = Arc::new(Mock::new());
        mock.setup_method::<u32>("f", Parameters::Any)
            .returns(1).for_times(50)
            .returns(2);
        let handles = (0..4).map(|_| {
            let mock = mock.clone();
            thread::spawn(move || {
                (0..50).map(|_| mock.call::<u32>("f", vec![]).unwrap())
                    .filter(|r| *r == 1)
                    .count()
            })
        }).collect::<Vec<_>>();
        let ones = handles.into_iter()
            .map(|h| h.join().unwrap())
            .sum::<usize>();
        assert_eq!(50, ones);
    }
}

mod registry {
    use super::*;

    #[test]
    fn registration_order() {
        let registry = SetupRegistry::new();
        let a = registry.register(MethodSetup::new("a", Parameters::Any));
        let b = registry.register(MethodSetup::new("b", Parameters::Any));
        assert_eq!(0, a.registration_order());
        assert_eq!(1, b.registration_order());
        assert_eq!(2, registry.len());

        registry.clear();
        assert!(registry.is_empty());
        let c = registry.register(MethodSetup::new("a", Parameters::Any));
        assert_eq!(2, c.registration_order());
    }

    #[test]
    fn resolve_by_kind() {
        let registry = SetupRegistry::new();
        registry.register(MethodSetup::for_kind(InvocationKind::PropertyGet,
                                                "X", Parameters::none()));
        assert!(registry.resolve(InvocationKind::PropertyGet, "X", &[])
                .is_some());
        assert!(registry.resolve(InvocationKind::MethodCall, "X", &[])
                .is_none());
    }

    #[test]
    fn setups_in_registration_order() {
        let registry = SetupRegistry::new();
        for m in ["c", "a", "b"] {
            registry.register(MethodSetup::new(m, Parameters::Any));
        }
        let members = registry.setups()
            .iter()
            .map(|s| s.member().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(members, ["c", "a", "b"]);
    }
}

mod not_set_up {
    use super::*;

    #[test]
    fn lenient_returns_default() {
        let mock = Mock::new();
        assert_eq!(0, mock.call::<u64>("f", vec![]).unwrap());
        assert_eq!("", mock.call::<String>("g", vec![]).unwrap());
        let outcome = mock.execute("h", vec![]).unwrap();
        assert!(matches!(outcome.resolution(), Resolution::Default));
    }

    #[test]
    fn strict_fails() {
        let mock = Mock::with_behavior(MockBehavior::strict());
        let e = mock.call::<u32>("foo", vec![Value::new(4i32)]).unwrap_err();
        assert!(e.is_not_configured());
        assert_eq!("foo(4) was invoked, but no setup matches it", e.to_string());
        // The invocation is recorded regardless
        mock.verify_method("foo", Param::eq(4i32)).once();
    }

    #[test]
    fn strict_with_mismatched_arguments() {
        let mock = Mock::with_behavior(MockBehavior::strict());
        mock.setup_method::<u32>("foo", Param::eq(1i32)).returns(1);
        assert_eq!(1, mock.call::<u32>("foo", vec![Value::new(1i32)]).unwrap());
        assert!(mock.call::<u32>("foo", vec![Value::new(2i32)]).is_err());
    }

    #[test]
    fn strict_with_a_setup_that_returns_nothing() {
        let mock = Mock::with_behavior(MockBehavior::strict());
        mock.setup_method::<u32>("foo", Parameters::Any).callback(|_| ());
        assert_eq!(0, mock.call::<u32>("foo", vec![]).unwrap());
    }

    #[test]
    fn call_base() {
        let behavior = MockBehavior::new().with_call_base_class(true);
        let mock = Mock::with_behavior(behavior);
        fn base(args: &Arguments) -> u32 {
            args.get::<u32>(0).unwrap() * 10
        }
        let r = mock.call_or_base("f", vec![Value::new(2u32)], base);
        assert_eq!(20, r.unwrap());

        mock.setup_method::<u32>("f", Parameters::Any).returns(1);
        let r = mock.call_or_base("f", vec![Value::new(2u32)], base);
        assert_eq!(1, r.unwrap());
    }

    #[test]
    fn base_is_not_called_unless_configured() {
        let mock = Mock::new();
        let r = mock.call_or_base::<u32, _>("f", vec![], |_| panic!("called"));
        assert_eq!(0, r.unwrap());
    }

    #[test]
    fn strictness_takes_precedence_over_base() {
        let behavior = MockBehavior::strict().with_call_base_class(true);
        let mock = Mock::with_behavior(behavior);
        let e = mock.execute("f", vec![]).unwrap_err();
        assert!(e.is_not_configured());
    }
}

mod type_mismatch {
    use super::*;

    fn assert_mismatch<T: std::fmt::Debug>(r: Result<T>) {
        match r {
            Err(MockError::TypeMismatch { .. }) => (),
            other => panic!("Expected a type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn declared_return_type() {
        let mock = Mock::new();
        mock.setup_method::<u32>("f", Parameters::Any).returns(1);
        assert_mismatch(mock.call::<String>("f", vec![]));
    }

    #[test]
    fn declared_return_type_without_a_value() {
        let mock = Mock::new();
        mock.setup_method::<u32>("f", Parameters::Any);
        assert_mismatch(mock.call::<u64>("f", vec![]));
    }

    #[test]
    fn hand_built_setup() {
        let mock = Mock::new();
        let setup = mock.register_setup(MethodSetup::new("g", Parameters::Any));
        SetupBuilder::<u32>::new(setup).unwrap().returns(7);
        assert_eq!(7, mock.call::<u32>("g", vec![]).unwrap());
        assert_mismatch(mock.call::<i64>("g", vec![]));
    }

    #[test]
    fn builder_for_the_wrong_type() {
        let mock = Mock::new();
        let setup = mock.register_setup(MethodSetup::new("h", Parameters::Any)
                                        .returning_type::<u8>());
        assert_mismatch(SetupBuilder::<String>::new(setup));
    }

    #[test]
    fn argument_read_as_the_wrong_type() {
        let mock = Mock::new();
        mock.setup_method::<u32>("f", Parameters::Any)
            .try_returning(|args| args.get::<u32>(0).copied());
        assert_eq!(3, mock.call::<u32>("f", vec![Value::new(3u32)]).unwrap());
        assert_mismatch(mock.call::<u32>("f", vec![Value::new(3i8)]));
    }

    #[test]
    fn value_get() {
        assert_mismatch(Value::new(1u8).get::<u16>());
        assert_mismatch(Value::null().get::<u16>());
    }

    #[test]
    fn value_get_names_both_types() {
        match Value::new(1u8).get::<u16>() {
            Err(MockError::TypeMismatch { expected, found, .. }) => {
                assert_eq!("u16", expected);
                assert_eq!("u8", found);
            },
            other => panic!("Expected a type mismatch, got {:?}", other),
        }
    }
}

mod bookkeeping {
    use super::*;

    #[test]
    fn checkpoint_drops_setups_but_keeps_interactions() {
        let mock = Mock::new();
        mock.setup_method::<u32>("f", Parameters::Any).returns(1);
        assert_eq!(1, mock.call::<u32>("f", vec![]).unwrap());
        mock.checkpoint();
        assert_eq!(0, mock.call::<u32>("f", vec![]).unwrap());
        assert_eq!(2, mock.interactions().len());
        assert!(mock.registry().is_empty());
    }

    #[test]
    fn unused_setups() {
        let mock = Mock::new();
        mock.setup_method::<()>("a", Parameters::Any);
        mock.setup_method::<()>("b", Parameters::Any);
        mock.call::<()>("a", vec![]).unwrap();
        let unused = mock.unused_setups();
        assert_eq!(1, unused.len());
        assert_eq!("b", unused[0].member());
    }

    #[test]
    #[should_panic(expected = "1 setup(s) were never used:\n  b(..)")]
    fn verify_all_setups_used() {
        let mock = Mock::new();
        mock.setup_method::<()>("a", Parameters::Any);
        mock.setup_method::<()>("b", Parameters::Any);
        mock.call::<()>("a", vec![]).unwrap();
        mock.verify_all_setups_used();
    }
}
