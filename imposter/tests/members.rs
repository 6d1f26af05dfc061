// vim: tw=80
//! Properties, indexers and events
#![deny(warnings)]

use std::{
    io,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering}
    },
    thread,
};

use imposter::*;

mod properties {
    use super::*;

    #[test]
    fn set_then_get() {
        let mock = Mock::new();
        mock.set_property("Name", Value::new("Bob".to_owned())).unwrap();
        assert_eq!("Bob", mock.get_property::<String>("Name").unwrap());
    }

    #[test]
    fn unset_is_default() {
        let mock = Mock::new();
        assert_eq!(0, mock.get_property::<u32>("Count").unwrap());
    }

    #[test]
    fn null_is_default() {
        let mock = Mock::new();
        mock.set_property("Name", Value::null()).unwrap();
        assert_eq!("", mock.get_property::<String>("Name").unwrap());
    }

    #[test]
    fn strict_unset_fails() {
        let mock = Mock::with_behavior(MockBehavior::strict());
        let e = mock.get_property::<u32>("Count").unwrap_err();
        assert_eq!("get Count was invoked, but no setup matches it",
                   e.to_string());
    }

    #[test]
    fn strict_set_never_fails() {
        let mock = Mock::with_behavior(MockBehavior::strict());
        mock.set_property("Count", Value::new(3u32)).unwrap();
        assert_eq!(3, mock.get_property::<u32>("Count").unwrap());
    }

    #[test]
    fn getter_setup_overrides_stored_value() {
        let mock = Mock::new();
        mock.set_property("Count", Value::new(3u32)).unwrap();
        mock.setup_property_get::<u32>("Count")
            .returns(10).for_times(1);
        assert_eq!(10, mock.get_property::<u32>("Count").unwrap());
        // Once the setup is exhausted the stored value shows through again
        assert_eq!(3, mock.get_property::<u32>("Count").unwrap());
    }

    #[test]
    fn initialize_records_nothing() {
        let mock = Mock::new();
        mock.initialize_property("Count", Value::new(8u32));
        assert!(mock.interactions().is_empty());
        assert_eq!(8, mock.get_property::<u32>("Count").unwrap());
    }

    #[test]
    fn wrong_type() {
        let mock = Mock::new();
        mock.initialize_property("Count", Value::new(8u8));
        let e = mock.get_property::<String>("Count").unwrap_err();
        assert!(matches!(e, MockError::TypeMismatch { .. }));
    }

    #[test]
    fn setter_setup_sees_assigned_value() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let mock = Mock::new();
        mock.setup_property_set("Name", Param::any::<String>())
            .callback(move |args| {
                s.lock().unwrap().push(args.get::<String>(0).unwrap().clone())
            });
        mock.set_property("Name", Value::new("a".to_owned())).unwrap();
        mock.set_property("Name", Value::new("b".to_owned())).unwrap();
        assert_eq!(*seen.lock().unwrap(), ["a", "b"]);
    }

    #[test]
    fn setter_may_throw() {
        let mock = Mock::new();
        mock.set_property("Name", Value::new("good".to_owned())).unwrap();
        mock.setup_property_set("Name", Param::eq("bad".to_owned()))
            .throws(|_| io::Error::new(io::ErrorKind::InvalidInput, "no"));
        assert!(mock.set_property("Name", Value::new("bad".to_owned()))
                .is_err());
        // A failed assignment doesn't change the stored value
        assert_eq!("good", mock.get_property::<String>("Name").unwrap());
    }

    #[test]
    fn verify() {
        let mock = Mock::new();
        mock.set_property("Count", Value::new(1u32)).unwrap();
        mock.set_property("Count", Value::new(2u32)).unwrap();
        mock.get_property::<u32>("Count").unwrap();
        mock.verify_property_set("Count", Param::eq(2u32)).once();
        mock.verify_property_set("Count", Param::any::<u32>()).exactly(2);
        mock.verify_property_get("Count").once();
        mock.verify_property_get("Size").never();
        mock.verify_all_interactions_verified();
    }
}

mod indexers {
    use super::*;

    #[test]
    fn getter_setup() {
        let mock = Mock::new();
        mock.setup_indexer_get::<String>(Param::eq(1usize))
            .returns("one".to_owned());
        let one = mock.get_indexer::<String>(vec![Value::new(1usize)]);
        assert_eq!("one", one.unwrap());
        let two = mock.get_indexer::<String>(vec![Value::new(2usize)]);
        assert_eq!("", two.unwrap());
    }

    #[test]
    fn multiple_index_arguments() {
        let mock = Mock::new();
        mock.setup_indexer_get::<f64>([Param::any::<usize>(),
                                       Param::any::<usize>()])
            .returning(|args| {
                let r = *args.get::<usize>(0).unwrap();
                let c = *args.get::<usize>(1).unwrap();
                (r * 10 + c) as f64
            });
        let v = mock.get_indexer::<f64>(vec![Value::new(2usize),
                                             Value::new(3usize)]);
        assert_eq!(23.0, v.unwrap());
    }

    #[test]
    fn strict_get_fails() {
        let mock = Mock::with_behavior(MockBehavior::strict());
        let e = mock.get_indexer::<u8>(vec![Value::new(2usize)]).unwrap_err();
        assert_eq!("Item[2] was invoked, but no setup matches it",
                   e.to_string());
    }

    #[test]
    fn set_stores_nothing() {
        let mock = Mock::with_behavior(MockBehavior::strict());
        mock.set_indexer(vec![Value::new(0usize)], Value::new(5u8)).unwrap();
        assert!(mock.get_indexer::<u8>(vec![Value::new(0usize)]).is_err());
    }

    #[test]
    fn setter_setup() {
        let total = Arc::new(AtomicUsize::new(0));
        let t = total.clone();
        let mock = Mock::new();
        mock.setup_indexer_set(Param::any::<usize>(), Param::any::<usize>())
            .callback(move |args| {
                let value = args.get::<usize>(1).unwrap();
                t.fetch_add(*value, Ordering::Relaxed);
            });
        mock.set_indexer(vec![Value::new(0usize)], Value::new(5usize))
            .unwrap();
        mock.set_indexer(vec![Value::new(1usize)], Value::new(6usize))
            .unwrap();
        assert_eq!(11, total.load(Ordering::Relaxed));
    }

    #[test]
    fn verify() {
        let mock = Mock::new();
        mock.set_indexer(vec![Value::new(0usize)], Value::new("x")).unwrap();
        mock.get_indexer::<u8>(vec![Value::new(0usize)]).unwrap();
        mock.get_indexer::<u8>(vec![Value::new(1usize)]).unwrap();
        mock.verify_indexer_set(Param::eq(0usize), Param::eq("x")).once();
        mock.verify_indexer_set(Param::eq(1usize), Param::eq("x")).never();
        mock.verify_indexer_get(Param::any::<usize>()).exactly(2);
        mock.verify_indexer_get(Param::eq(1usize)).once();
    }
}

mod events {
    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Arguments) + Send + Sync) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, move |_: &Arguments| {
            h.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[test]
    fn raise_reaches_subscribers() {
        let (a, ha) = counter();
        let (b, hb) = counter();
        let mock = Mock::new();
        mock.subscribe("Changed", ha).unwrap();
        mock.subscribe("Changed", hb).unwrap();
        assert_eq!(2, mock.raise("Changed", vec![]));
        assert_eq!(1, a.load(Ordering::Relaxed));
        assert_eq!(1, b.load(Ordering::Relaxed));
    }

    #[test]
    fn raise_unknown_event() {
        let mock = Mock::new();
        assert_eq!(0, mock.raise("Closed", vec![Value::new(1u8)]));
    }

    #[test]
    fn unsubscribe() {
        let (a, ha) = counter();
        let (b, hb) = counter();
        let mock = Mock::new();
        let sub = mock.subscribe("Changed", ha).unwrap();
        mock.subscribe("Changed", hb).unwrap();
        assert!(mock.unsubscribe("Changed", sub).unwrap());
        assert!(!mock.unsubscribe("Changed", sub).unwrap());
        assert_eq!(1, mock.raise("Changed", vec![]));
        assert_eq!(0, a.load(Ordering::Relaxed));
        assert_eq!(1, b.load(Ordering::Relaxed));
    }

    #[test]
    fn handlers_receive_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let mock = Mock::new();
        mock.subscribe("Moved", move |args| {
            let x = *args.get::<i32>(0).unwrap();
            let y = *args.get::<i32>(1).unwrap();
            s.lock().unwrap().push((x, y));
        }).unwrap();
        mock.raise("Moved", vec![Value::new(1i32), Value::new(-1i32)]);
        assert_eq!(*seen.lock().unwrap(), [(1, -1)]);
    }

    #[test]
    fn raise_from_another_thread() {
        let (a, ha) = counter();
        let mock = Arc::new(Mock::new());
        mock.subscribe("Tick", ha).unwrap();
        let m = mock.clone();
        thread::spawn(move || m.raise("Tick", vec![])).join().unwrap();
        assert_eq!(1, a.load(Ordering::Relaxed));
    }

    #[test]
    fn subscription_setup_may_throw() {
        let (a, ha) = counter();
        let mock = Mock::new();
        let setup = mock.register_setup(MethodSetup::for_kind(
                InvocationKind::EventSubscribe, "Closed", Parameters::Any));
        SetupBuilder::<()>::new(setup).unwrap()
            .throws(|_| io::Error::other("sealed"));
        assert!(mock.subscribe("Closed", ha).is_err());
        assert_eq!(0, mock.raise("Closed", vec![]));
        assert_eq!(0, a.load(Ordering::Relaxed));
    }

    #[test]
    fn strict_subscription_without_setup() {
        let (_, ha) = counter();
        let mock = Mock::with_behavior(MockBehavior::strict());
        assert!(mock.subscribe("Changed", ha).is_ok());
    }

    #[test]
    fn verify() {
        let (_, ha) = counter();
        let mock = Mock::new();
        let sub = mock.subscribe("Changed", ha).unwrap();
        mock.unsubscribe("Changed", sub).unwrap();
        mock.verify_subscribed("Changed").once();
        mock.verify_unsubscribed("Changed").once();
        mock.verify_subscribed("Closed").never();
    }
}
