use sigbisect::render::hex_dump;

#[test]
fn dump_pads_short_rows_and_masks_unprintables() {
    let dump = hex_dump(b"Hello, world!\n\x00\xff", 0);
    assert_eq!(
        dump,
        "00000000  48 65 6c 6c 6f 2c 20 77  6f 72 6c 64 21 0a 00 ff  |Hello, world!...|\n"
    );
    let dump = hex_dump(b"MZ", 0x40);
    assert_eq!(dump, "00000040  4d 5a                                             |MZ|\n");
}

#[test]
fn dump_labels_rows_from_base() {
    let bytes: Vec<u8> = (0u8..20).collect();
    let dump = hex_dump(&bytes, 0x2a0);
    let rows: Vec<&str> = dump.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("000002a0  00 01"));
    assert!(rows[1].starts_with("000002b0  10 11 12 13"));
}

#[test]
fn empty_input_renders_nothing() {
    assert!(hex_dump(&[], 0).is_empty());
}
