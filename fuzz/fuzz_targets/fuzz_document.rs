#![no_main]
use arenaxml::{Attribute, Document, Element};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = Document::parse_bytes(data) else {
        return;
    };
    let mut root = doc.root_element();

    // Walk every element and mutate through the handles; nothing may panic
    // and the result must still be well-formed.
    let mut pending = vec![root.clone()];
    while let Some(mut element) = pending.pop() {
        let _ = element.attributes();
        let value = element.value();
        let _ = element.set_value(value.chars().rev().collect::<String>());
        pending.extend(element.children(""));
    }
    let _ = root.append_attribute(&Attribute::new("fuzz", "<&\"\n>"));
    let _ = root.append_element(&mut Element::with_value("fuzz", "]]>"));
    let _ = root.append_cdata("]]>");

    let output = doc.to_string();
    if let Err(e) = Document::parse(&output) {
        panic!("mutated document does not reparse: {e}\n{output}");
    }
});
