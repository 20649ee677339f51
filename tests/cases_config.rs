use qdwconv::cases::{default_cases, find_case, load_cases, BiasSpec, ConvCase};

fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("qdwconv_{}_{}.json", name, std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn builtin_cases_have_unique_names_and_run() {
    let cases = default_cases();
    let mut names: Vec<_> = cases.iter().map(|c| c.name.clone()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), cases.len());
    assert!(find_case("mbv2_7x7_c960_s1").is_some());
    assert!(find_case("nope").is_none());
    let uneven = find_case("uneven_11x9_c24_s1x3").unwrap();
    assert_ne!(uneven.stride_h, uneven.stride_w);

    let odd = find_case("batch4_13x17_c40_s3").unwrap();
    let data = odd.generate(0).unwrap();
    let mut out = vec![0u8; odd.shape().output_len()];
    data.run(&odd, &mut out, 3).unwrap();
    assert_eq!(out, data.reference(&odd));
}

#[test]
fn loads_json_with_defaults() {
    let path = temp_file(
        "defaults",
        r#"[{"name":"a","batch":1,"height":9,"width":9,"channels":24,"stride":2,"bias":"float","per_channel":true}]"#,
    );
    let cases: Vec<ConvCase> = load_cases(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(cases.len(), 1);
    let c = &cases[0];
    assert_eq!(c.bias, BiasSpec::Float);
    assert!(c.per_channel && !c.fuse_relu && c.col_offsets);
    assert_eq!((c.a_zero_point, c.b_zero_point, c.c_zero_point), (128, 0, 64));
    assert_eq!((c.stride_h, c.stride_w), (2, 2));
}

#[test]
fn loads_per_axis_strides() {
    let path = temp_file(
        "axes",
        r#"[{"name":"hw","batch":1,"height":11,"width":9,"channels":16,"stride_h":1,"stride_w":3},
            {"name":"mixed","batch":1,"height":11,"width":9,"channels":16,"stride":2,"stride_w":3}]"#,
    );
    let cases = load_cases(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!((cases[0].stride_h, cases[0].stride_w), (1, 3));
    assert_eq!((cases[1].stride_h, cases[1].stride_w), (2, 3));
    let shape = cases[0].shape();
    assert_eq!((shape.out_height(), shape.out_width()), (11, 3));

    let data = cases[0].generate(9).unwrap();
    let mut out = vec![0u8; shape.output_len()];
    data.run(&cases[0], &mut out, 4).unwrap();
    assert_eq!(out, data.reference(&cases[0]));
}

#[test]
fn missing_stride_is_a_parse_error() {
    let path = temp_file("nostride", r#"[{"name":"n","batch":1,"height":3,"width":3,"channels":8,"stride_h":2}]"#);
    let err = load_cases(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(format!("{:#}", err).contains("needs `stride`"));
}

#[test]
fn saved_cases_load_back() {
    let cases = default_cases();
    let path = temp_file("roundtrip", &serde_json::to_string(&cases).unwrap());
    let loaded = load_cases(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, cases);
}

#[test]
fn rejects_zero_stride_and_bad_json() {
    let path = temp_file("zero", r#"[{"name":"z","batch":1,"height":3,"width":3,"channels":8,"stride":0}]"#);
    let err = load_cases(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(err.to_string().contains("zero extent or stride"));

    let path = temp_file("garbage", "not json");
    let err = load_cases(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(format!("{:#}", err).contains("parse case file"));

    assert!(load_cases("/definitely/missing/cases.json").is_err());
}
