//! Scenarios exercising the ingestion window/modality walk (§4.5).

use crate::workdir::Workdir;

#[test]
fn test_s1_single_document_window_one() {
    let wrk = Workdir::new("ingest_s1");
    wrk.write("vocab.txt", "a\nb\nc\n");
    wrk.write("corpus.vw", "doc1 a b c\n");

    let tf_path = wrk.path("tf.txt");
    let df_path = wrk.path("df.txt");
    let ppmi_path = wrk.path("ppmi.txt");

    let output = wrk.run(&[
        "--vocab",
        "vocab.txt",
        "--vw",
        "corpus.vw",
        "--window-width",
        "1",
        "--cooc-tf-file",
        tf_path.to_str().unwrap(),
        "--cooc-df-file",
        df_path.to_str().unwrap(),
        "--ppmi-tf-file",
        ppmi_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{:?}", output);

    let mut tf_lines = wrk.read_lines("tf.txt");
    tf_lines.sort();
    assert_eq!(tf_lines, vec!["0 1 1", "1 0 1", "1 2 1", "2 1 1"]);

    let mut df_lines = wrk.read_lines("df.txt");
    df_lines.sort();
    assert_eq!(df_lines, tf_lines);

    // pair_occurrences: n(a)=1, n(b)=2, n(c)=1, N_pairs=4 (see DESIGN.md's
    // note on the S1 PPMI worked example for why this isn't all-zero).
    let mut ppmi_lines = wrk.read_lines("ppmi.txt");
    ppmi_lines.sort();
    assert_eq!(ppmi_lines.len(), 2);
    for line in &ppmi_lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let ppmi: f64 = fields[2].parse().unwrap();
        assert!((ppmi - 2.0_f64.ln()).abs() < 1e-9);
    }
}

#[test]
fn test_s3_modality_marker_free_window_extension() {
    let wrk = Workdir::new("ingest_s3");
    wrk.write("vocab.txt", "a\nb\nx\n");
    wrk.write("corpus.vw", "doc1 a |@other x |@default_class b\n");

    let tf_path = wrk.path("tf.txt");

    let output = wrk.run(&[
        "--vocab",
        "vocab.txt",
        "--vw",
        "corpus.vw",
        "--window-width",
        "1",
        "--cooc-tf-file",
        tf_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{:?}", output);

    let mut tf_lines = wrk.read_lines("tf.txt");
    tf_lines.sort();
    assert_eq!(tf_lines, vec!["0 1 1", "1 0 1"]);
}

#[test]
fn test_symmetry_and_half_file_property() {
    let wrk = Workdir::new("ingest_symmetry");
    wrk.write("vocab.txt", "a\nb\nc\nd\n");
    wrk.write("corpus.vw", "doc1 a b c d\n");

    let tf_path = wrk.path("tf.txt");
    let ppmi_path = wrk.path("ppmi.txt");
    let output = wrk.run(&[
        "--vocab",
        "vocab.txt",
        "--vw",
        "corpus.vw",
        "--window-width",
        "3",
        "--cooc-tf-file",
        tf_path.to_str().unwrap(),
        "--ppmi-tf-file",
        ppmi_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{:?}", output);

    let tf_lines = wrk.read_lines("tf.txt");
    for line in &tf_lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (u, v, c) = (fields[0], fields[1], fields[2]);
        let reverse = format!("{} {} {}", v, u, c);
        assert!(
            tf_lines.contains(&reverse),
            "missing symmetric line for {}",
            line
        );
    }

    for line in wrk.read_lines("ppmi.txt") {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let u: u32 = fields[0].parse().unwrap();
        let v: u32 = fields[1].parse().unwrap();
        let ppmi: f64 = fields[2].parse().unwrap();
        assert!(u < v);
        assert!(ppmi > 0.0);
    }
}
