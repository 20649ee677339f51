use pretty_assertions::assert_eq;
use qdwconv::cases::{BiasSpec, ConvCase};

fn run_with(case: &ConvCase, threads: usize) -> Vec<u8> {
    let data = case.generate(3).unwrap();
    let mut out = vec![0u8; case.shape().output_len()];
    for tid in 0..threads {
        data.run_worker(case, &mut out, tid, threads).unwrap();
    }
    out
}

#[test]
fn output_does_not_depend_on_thread_count() {
    let mut cases = vec![
        ConvCase::small("single_image", 1, 17, 13, 48, 1),
        ConvCase::small("two_images", 2, 9, 9, 32, 2),
        ConvCase::small("many_images", 5, 6, 6, 16, 1),
    ];
    cases[1].per_channel = true;
    cases[1].bias = BiasSpec::Float;
    cases[2].fuse_relu = true;
    for case in &cases {
        let single = run_with(case, 1);
        for threads in [2, 3, 4, 5, 6, 7, 8, 12, 16, 64] {
            assert_eq!(run_with(case, threads), single, "{} with {} workers", case.name, threads);
        }
    }
}

#[test]
fn more_workers_than_pixels() {
    let case = ConvCase::small("tiny", 1, 2, 2, 8, 1);
    assert_eq!(run_with(&case, 37), run_with(&case, 1));
}

#[test]
fn unequal_strides_do_not_depend_on_thread_count() {
    for (sh, sw) in [(1, 3), (3, 2)] {
        for per_channel in [false, true] {
            let mut case = ConvCase::small("strided", 2, 11, 9, 40, 1).with_strides(sh, sw);
            case.per_channel = per_channel;
            let single = run_with(&case, 1);
            for threads in [2, 3, 5, 8, 13] {
                assert_eq!(run_with(&case, threads), single, "stride {}x{} per_channel={} with {} workers", sh, sw, per_channel, threads);
            }
        }
    }
}
