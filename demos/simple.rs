//! One value through all three wire formats.
//!
//! Run with: cargo run --example simple

use polycodec::{from_slice, reflect_struct, to_vec, CborHandle, JsonHandle, SimpleHandle};
use std::error::Error;

#[derive(Debug, Default, PartialEq)]
struct User {
    id: u32,
    name: String,
    email: String,
    nickname: Option<String>,
}

reflect_struct!(User {
    id codec = "id",
    name codec = "name",
    email codec = "email",
    nickname codec = "nickname,omitempty",
});

fn main() -> Result<(), Box<dyn Error>> {
    let users = vec![
        User {
            id: 42,
            name: "Alice Johnson".to_string(),
            email: "alice@example.com".to_string(),
            nickname: None,
        },
        User {
            id: 43,
            name: "Bob Smith".to_string(),
            email: "bob@example.com".to_string(),
            nickname: Some("bobby".to_string()),
        },
    ];

    let pretty = JsonHandle::new().with_indent(2);
    let json = to_vec(&pretty, &users)?;
    println!("JSON ({} bytes):\n{}\n", json.len(), String::from_utf8(json.clone())?);

    let cbor = to_vec(&CborHandle::new(), &users)?;
    println!("CBOR ({} bytes): {:02x?}\n", cbor.len(), cbor);

    let simple = to_vec(&SimpleHandle::new(), &users)?;
    println!("simple ({} bytes): {:02x?}\n", simple.len(), simple);

    let from_json: Vec<User> = from_slice(&pretty, &json)?;
    let from_cbor: Vec<User> = from_slice(&CborHandle::new(), &cbor)?;
    let from_simple: Vec<User> = from_slice(&SimpleHandle::new(), &simple)?;
    assert_eq!(users, from_json);
    assert_eq!(users, from_cbor);
    assert_eq!(users, from_simple);
    println!("✓ Round-trip successful in every format");

    Ok(())
}
