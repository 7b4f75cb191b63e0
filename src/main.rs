use std::env;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

use randsketch::context::{DistributionType, RandomContext};
use randsketch::dense_apply::{sketch_dist_dense, sketch_local_dense};
use randsketch::dist::{DistDenseMatrix, SingleProcess};
use randsketch::sparse_apply::sketch_sparse;
use randsketch::test_assist::{
    check_approx_equal, explicit_multiply, generate_random_csc, generate_random_matrix,
    scattered_operator,
};
use randsketch::transform::{DenseTransform, HashTransform, SketchDirection, TransformRecord};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut seed: u64 = 38734;
    let mut numfeatures: usize = 200;
    let mut density: f64 = 0.05;
    let mut modelname = String::from("transform.json");
    let mut outname = String::from("sketch_results.csv");

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args.get(i + 1).cloned().unwrap_or_default();
        match flag {
            "--seed" | "-s" => seed = value.parse().expect("seed must be an integer"),
            "--numfeatures" | "-f" => {
                numfeatures = value.parse().expect("numfeatures must be an integer")
            }
            "--density" | "-d" => density = value.parse().expect("density must be a number"),
            "--model" => modelname = value,
            "--output" | "-o" => outname = value,
            other => {
                eprintln!("unknown option {}", other);
                eprintln!(
                    "usage: randsketch [--seed N] [--numfeatures N] [--density F] \
                     [--model FILE] [--output FILE]"
                );
                std::process::exit(1);
            }
        }
        i += 2;
    }

    let mut csv_data = String::new();
    csv_data.push_str(
        "Matrix Size,Sketch Size,Hash Dense Time,Hash Sparse Time,Dense Gaussian Time,Max Error\n",
    );

    let sizes = vec![500, 1000, 1500];

    for &n in &sizes {
        let m = n / 10;
        let s = numfeatures.min(n);

        let mut context = RandomContext::new(seed);
        let hash = HashTransform::new(n, s, &mut context).expect("hash transform construction");
        let dense = DenseTransform::new(n, s, &mut context, DistributionType::Gaussian)
            .expect("dense transform construction");

        let data = generate_random_matrix(seed ^ n as u64, n, m);
        let dist = DistDenseMatrix::partition(&data, 0, 1).expect("partitioning");
        let sparse = generate_random_csc(seed ^ ((n as u64) << 1), n, m, density);

        let start = Instant::now();
        let hash_dense =
            sketch_dist_dense(&hash, &dist, SketchDirection::Columnwise, &SingleProcess)
                .expect("dense hash apply");
        let hash_dense_time = start.elapsed();

        let start = Instant::now();
        let hash_sparse =
            sketch_sparse(&hash, &sparse, SketchDirection::Columnwise).expect("sparse hash apply");
        let hash_sparse_time = start.elapsed();

        let start = Instant::now();
        let gaussian = sketch_local_dense(&dense, &data, SketchDirection::Columnwise)
            .expect("dense gaussian apply");
        let gaussian_time = start.elapsed();

        // Verify the on-the-fly paths against the materialized operator.
        let pi = scattered_operator(&hash);
        let expected_dense = explicit_multiply(&pi, &data);
        assert!(check_approx_equal(&hash_dense, &expected_dense, 1e-8));
        let expected_sparse = explicit_multiply(&pi, &sparse.to_dense());
        assert!(check_approx_equal(
            &hash_sparse.to_dense(),
            &expected_sparse,
            1e-8
        ));

        let max_error = (&hash_dense - &expected_dense).abs().max();
        log::info!(
            "n = {}, s = {}: hash dense {:?}, hash sparse {:?} ({} nnz), gaussian {:?} ({}x{})",
            n,
            s,
            hash_dense_time,
            hash_sparse_time,
            hash_sparse.nnz(),
            gaussian_time,
            gaussian.nrows(),
            gaussian.ncols()
        );

        csv_data.push_str(&format!(
            "{},{},{:?},{:?},{:?},{}\n",
            n, s, hash_dense_time, hash_sparse_time, gaussian_time, max_error
        ));

        // Persist the hash operator and prove the record reproduces it.
        let record = hash.to_record().expect("hash transform carries a seed");
        let json = serde_json::to_string_pretty(&record).expect("record serialization");
        let mut file = File::create(&modelname).expect("Unable to create model file");
        file.write_all(json.as_bytes())
            .expect("Unable to write model file");

        let reloaded: TransformRecord =
            serde_json::from_str(&json).expect("record deserialization");
        let rebuilt = HashTransform::from_record(&reloaded).expect("record replay");
        assert_eq!(hash.row_idx(), rebuilt.row_idx());
        assert_eq!(hash.row_value(), rebuilt.row_value());
    }

    let mut file = File::create(&outname).expect("Unable to create file");
    file.write_all(csv_data.as_bytes())
        .expect("Unable to write data to file");
}
