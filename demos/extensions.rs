//! Giving a type its own wire representation.
//!
//! Run with: cargo run --example extensions

use polycodec::{
    from_slice, reflect_opaque, reflect_struct, to_vec, CborHandle, JsonHandle, Registry,
    SimpleHandle, Value,
};
use std::error::Error;
use std::sync::Arc;

/// An amount of money in cents. Opaque: it is only encodable through the
/// extension registered below.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
struct Money {
    cents: i64,
}

reflect_opaque!(Money);

#[derive(Debug, Default, PartialEq)]
struct Invoice {
    customer: String,
    total: Money,
}

reflect_struct!(Invoice {
    customer codec = "customer",
    total codec = "total",
});

fn main() -> Result<(), Box<dyn Error>> {
    let registry = Registry::new();
    registry.register_bytes_ext::<Money>(
        7,
        |m| m.cents.to_be_bytes().to_vec(),
        |b| {
            let raw: [u8; 8] = b.try_into().map_err(polycodec::Error::custom)?;
            Ok(Money {
                cents: i64::from_be_bytes(raw),
            })
        },
    )?;
    let registry = Arc::new(registry);

    let invoice = Invoice {
        customer: "ACME".to_string(),
        total: Money { cents: 1050 },
    };

    let simple = SimpleHandle::new().with_registry(registry.clone());
    let bytes = to_vec(&simple, &invoice)?;
    println!("simple: {:02x?}", bytes);
    assert_eq!(from_slice::<Invoice>(&simple, &bytes)?, invoice);

    let cbor = CborHandle::new().with_registry(registry.clone());
    let bytes = to_vec(&cbor, &invoice)?;
    println!("CBOR:   {:02x?}", bytes);
    assert_eq!(from_slice::<Invoice>(&cbor, &bytes)?, invoice);

    // A decoder without the registration still keeps the tag and payload.
    let untyped: Value = from_slice(&CborHandle::new(), &bytes)?;
    println!("untyped view: {}", untyped);

    let json = JsonHandle::new().with_registry(registry);
    let bytes = to_vec(&json, &invoice)?;
    println!("JSON:   {}", String::from_utf8(bytes.clone())?);
    assert_eq!(from_slice::<Invoice>(&json, &bytes)?, invoice);

    println!("✓ Money survived every format");
    Ok(())
}
