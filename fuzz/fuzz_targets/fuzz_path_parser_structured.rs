#![no_main]

use arbitrary::Arbitrary;
use databind_model::{Model, json};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum FuzzToken {
    Ident(u8),
    Dot,
    Literal(u8),
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Comma,
    Space,
    Raw(u8),
}

impl FuzzToken {
    fn push_to(&self, out: &mut String) {
        const NAMES: &[&str] = &["a", "items", "index", "object", "f", "$x", "_"];
        match self {
            FuzzToken::Ident(n) => out.push_str(NAMES[*n as usize % NAMES.len()]),
            FuzzToken::Dot => out.push('.'),
            FuzzToken::Literal(n) => out.push_str(&(n % 8).to_string()),
            FuzzToken::OpenBracket => out.push('['),
            FuzzToken::CloseBracket => out.push(']'),
            FuzzToken::OpenParen => out.push('('),
            FuzzToken::CloseParen => out.push(')'),
            FuzzToken::Comma => out.push(','),
            FuzzToken::Space => out.push(' '),
            FuzzToken::Raw(b) => out.push(char::from(b & 0x7f)),
        }
    }
}

fuzz_target!(|input: (Vec<FuzzToken>, i8)| {
    let (tokens, value) = input;
    let mut source = String::new();
    for token in tokens.iter().take(64) {
        token.push_to(&mut source);
    }

    let model = Model::new("fuzz");
    let _ = model.attr("index", 1);
    let _ = model.attr("items", json!([0, 1, {"a": 2}]));
    let _ = model.attr("object", json!({"items": [{"a": 1}], "a": {"a": []}}));
    let _ = model.computed("f", |_, args| Ok(json!(args.len())));

    // Resolution may fail but must never panic.
    let _ = model.get(&source);
    let _ = model.attr(&source, value);
    let _ = model.get(&source);
    let _ = model.array(&source).and_then(|array| array.push(value));
});
