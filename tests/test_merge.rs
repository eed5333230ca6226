//! Scenarios exercising the merge's cross-batch accumulation and
//! min-tf/min-df thresholding (§4.6).

use crate::workdir::Workdir;

#[test]
fn test_s2_repeated_pair_across_two_documents() {
    let wrk = Workdir::new("merge_s2");
    wrk.write("vocab.txt", "a\nb\n");
    wrk.write("corpus.vw", "doc1 a b\ndoc2 a b\n");

    let tf_path = wrk.path("tf.txt");
    let df_path = wrk.path("df.txt");

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
    ]);
    assert!(output.status.success(), "{:?}", output);

    let mut tf_lines = wrk.read_lines("tf.txt");
    tf_lines.sort();
    assert_eq!(tf_lines, vec!["0 1 2", "1 0 2"]);

    let mut df_lines = wrk.read_lines("df.txt");
    df_lines.sort();
    assert_eq!(df_lines, vec!["0 1 2", "1 0 2"]);
}

#[test]
fn test_s4_min_tf_threshold() {
    let wrk = Workdir::new("merge_s4");
    wrk.write("vocab.txt", "a\nb\n");
    let corpus: String = "d a b\n".repeat(1000);
    wrk.write("corpus.vw", &corpus);

    let tf_path_kept = wrk.path("tf_kept.txt");
    let output = wrk.run(&[
        "--vocab",
        "vocab.txt",
        "--vw",
        "corpus.vw",
        "--window-width",
        "1",
        "--cooc-min-tf",
        "500",
        "--cooc-tf-file",
        tf_path_kept.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{:?}", output);
    let mut tf_lines = wrk.read_lines("tf_kept.txt");
    tf_lines.sort();
    assert_eq!(tf_lines, vec!["0 1 1000", "1 0 1000"]);

    let tf_path_dropped = wrk.path("tf_dropped.txt");
    let output = wrk.run(&[
        "--vocab",
        "vocab.txt",
        "--vw",
        "corpus.vw",
        "--window-width",
        "1",
        "--cooc-min-tf",
        "2001",
        "--cooc-tf-file",
        tf_path_dropped.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{:?}", output);
    assert!(wrk.read_lines("tf_dropped.txt").is_empty());
}
