//! Tests for property handles: remote set forwarding, the read-only
//! no-op policy, adapter-role emission shapes, and typed access.

mod common;

use std::sync::{Arc, Mutex};

use busproxy::constants::PROPERTIES_INTERFACE;
use busproxy::{
    ObjectProxy, PropertyEvent, PropertyProxy, PropertyProxyBase, PropertyRole,
    PropertyUpdateType, ProxyError,
};
use common::MockConnection;
use zvariant::Value;

fn owned(value: impl Into<Value<'static>>) -> zvariant::OwnedValue {
    let value: Value<'static> = value.into();
    value.try_to_owned().unwrap()
}

#[test]
fn proxy_set_forwards_a_properties_set_call() {
    let conn = MockConnection::new();
    let obj = ObjectProxy::builder()
        .connection(conn.clone())
        .destination("org.example.Daemon")
        .path("/org/example/Obj")
        .unwrap()
        .build()
        .unwrap();
    let iface = obj.create_interface("org.example.Iface").unwrap();
    let volume = iface
        .create_property::<u32>("Volume", PropertyUpdateType::Updates)
        .unwrap();

    volume.set_value(11).unwrap();

    let sent = conn.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].interface(), Some(PROPERTIES_INTERFACE));
    assert_eq!(sent[0].member(), "Set");
    assert_eq!(sent[0].body_signature(), "ssv");
    let body = sent[0].body();
    assert_eq!(
        String::try_from(body[0].clone()).unwrap(),
        "org.example.Iface"
    );
    assert_eq!(String::try_from(body[1].clone()).unwrap(), "Volume");
    assert_eq!(u32::try_from(body[2].clone()).unwrap(), 11);
}

#[test]
fn read_only_proxy_write_is_a_silent_success() {
    let conn = MockConnection::new();
    let obj = ObjectProxy::builder()
        .connection(conn.clone())
        .path("/org/example/Obj")
        .unwrap()
        .build()
        .unwrap();
    let iface = obj.create_interface("org.example.Iface").unwrap();
    let serial = iface
        .create_property::<String>("Serial", PropertyUpdateType::DoesNotUpdate)
        .unwrap();

    serial.set_value("ignored".to_string()).unwrap();
    assert_eq!(conn.sent_count(), 0);
}

#[test]
fn detached_proxy_property_cannot_set() {
    let base = PropertyProxyBase::create(
        "Volume",
        PropertyUpdateType::Updates,
        PropertyRole::Proxy,
    );
    assert!(matches!(
        base.set_value(owned(3u32)),
        Err(ProxyError::Detached)
    ));
}

#[test]
fn dropping_an_interface_detaches_its_properties() {
    let obj = ObjectProxy::create("/org/example/Obj").unwrap();
    let iface = obj.create_interface("org.example.Iface").unwrap();
    let volume = iface
        .create_property::<u32>("Volume", PropertyUpdateType::Updates)
        .unwrap();
    assert!(volume.base().interface().is_some());

    obj.remove_interface_handle(&iface);
    drop(iface);
    assert!(volume.base().interface().is_none());
    assert!(matches!(
        volume.set_value(5),
        Err(ProxyError::Detached)
    ));
}

#[test]
fn adapter_updates_emits_the_full_value() {
    let base = PropertyProxyBase::create(
        "Volume",
        PropertyUpdateType::Updates,
        PropertyRole::Adapter,
    );
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    base.on_emission(move |event| log.lock().unwrap().push(event.clone()));

    base.set_value(owned(4u32)).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        PropertyEvent::Changed { name, value } => {
            assert_eq!(name, "Volume");
            assert_eq!(u32::try_from(value.clone()).unwrap(), 4);
        }
        other => panic!("expected a full-value change, got {other:?}"),
    }
}

#[test]
fn adapter_invalidates_emits_no_payload() {
    let base = PropertyProxyBase::create(
        "Volume",
        PropertyUpdateType::Invalidates,
        PropertyRole::Adapter,
    );
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    base.on_emission(move |event| log.lock().unwrap().push(event.clone()));

    base.set_value(owned(9u32)).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        PropertyEvent::Invalidated { name } => assert_eq!(name, "Volume"),
        other => panic!("expected an invalidation marker, got {other:?}"),
    }
}

#[test]
fn adapter_does_not_update_emits_nothing_but_stores() {
    let base = PropertyProxyBase::create(
        "Volume",
        PropertyUpdateType::DoesNotUpdate,
        PropertyRole::Adapter,
    );
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    base.on_emission(move |event| log.lock().unwrap().push(event.clone()));

    base.set_value(owned(2u32)).unwrap();
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(
        u32::try_from(base.variant_value().unwrap()).unwrap(),
        2
    );
}

#[test]
fn updated_value_fires_typed_then_generic_observers() {
    let base = PropertyProxyBase::create(
        "Volume",
        PropertyUpdateType::Updates,
        PropertyRole::Proxy,
    );
    let typed: PropertyProxy<u32> = PropertyProxy::from_base(base.clone());

    let order = Arc::new(Mutex::new(Vec::new()));
    let log = order.clone();
    typed.on_changed(move |value| log.lock().unwrap().push(format!("typed:{value}")));
    let log = order.clone();
    base.on_variant_changed(move |_| log.lock().unwrap().push("generic".to_string()));

    base.updated_value(owned(8u32));

    assert_eq!(*order.lock().unwrap(), vec!["typed:8", "generic"]);
    assert_eq!(typed.value().unwrap(), 8);
}

#[test]
fn typed_access_enforces_the_declared_type() {
    let base = PropertyProxyBase::create(
        "Label",
        PropertyUpdateType::Updates,
        PropertyRole::Proxy,
    );
    let as_number: PropertyProxy<i32> = PropertyProxy::from_base(base.clone());

    assert!(matches!(
        as_number.value(),
        Err(ProxyError::NoCachedValue(name)) if name == "Label"
    ));

    base.updated_value(owned("text".to_string()));
    assert!(matches!(
        as_number.value(),
        Err(ProxyError::TypeMismatch(_))
    ));

    let as_text: PropertyProxy<String> = PropertyProxy::from_base(base);
    assert_eq!(as_text.value().unwrap(), "text");
}

#[test]
fn interface_passes_property_access_through() {
    let obj = ObjectProxy::create("/org/example/Obj").unwrap();
    let iface = obj.create_interface("org.example.Iface").unwrap();
    iface
        .create_property::<u32>("Volume", PropertyUpdateType::Updates)
        .unwrap();

    assert!(matches!(
        iface.property_value("Volume"),
        Err(ProxyError::NoCachedValue(_))
    ));
    assert!(matches!(
        iface.property_value("Missing"),
        Err(ProxyError::UnknownProperty(_))
    ));

    assert!(iface.property_updated("Volume", owned(6u32)));
    assert!(!iface.property_updated("Missing", owned(6u32)));
    assert_eq!(
        u32::try_from(iface.property_value("Volume").unwrap()).unwrap(),
        6
    );
}

#[test]
fn duplicate_property_names_are_rejected() {
    let obj = ObjectProxy::create("/org/example/Obj").unwrap();
    let iface = obj.create_interface("org.example.Iface").unwrap();
    iface
        .create_property::<u32>("Volume", PropertyUpdateType::Updates)
        .unwrap();
    assert!(matches!(
        iface.create_property::<u32>("Volume", PropertyUpdateType::Updates),
        Err(ProxyError::DuplicateProperty(name)) if name == "Volume"
    ));
}

#[test]
fn change_observers_can_unsubscribe() {
    let base = PropertyProxyBase::create(
        "Volume",
        PropertyUpdateType::Updates,
        PropertyRole::Proxy,
    );
    let seen = Arc::new(Mutex::new(0u32));
    let count = seen.clone();
    let id = base.on_variant_changed(move |_| *count.lock().unwrap() += 1);

    base.updated_value(owned(1u32));
    assert!(base.unsubscribe(id));
    base.updated_value(owned(2u32));
    assert_eq!(*seen.lock().unwrap(), 1);
}
