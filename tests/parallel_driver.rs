use pretty_assertions::assert_eq;
use qdwconv::cases::{BiasSpec, ConvCase};
use qdwconv::ConvError;

#[test]
fn rayon_driver_matches_sequential_workers() {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    for per_channel in [false, true] {
        let mut case = ConvCase::small("par", 3, 15, 11, 56, 1);
        case.per_channel = per_channel;
        case.bias = BiasSpec::Int;
        case.fuse_relu = true;
        let data = case.generate(12).unwrap();

        let mut seq = vec![0u8; case.shape().output_len()];
        for tid in 0..6 {
            data.run_worker(&case, &mut seq, tid, 6).unwrap();
        }
        let mut par = vec![0u8; case.shape().output_len()];
        pool.install(|| data.run(&case, &mut par, 6)).unwrap();
        assert_eq!(par, seq);
    }
}

#[test]
fn rayon_driver_validates_before_spawning() {
    let case = ConvCase::small("bad", 1, 4, 4, 8, 1);
    let data = case.generate(1).unwrap();
    let mut out = vec![0u8; 3];
    let err = data.run(&case, &mut out, 2).unwrap_err();
    assert!(matches!(err, ConvError::BufferTooSmall { what: "output", .. }));
}
