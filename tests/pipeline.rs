mod common;

use helix::config::{AssemblyConfig, PairedMetric, Stage};
use helix::io::reads::ReadStreams;
use helix::kmer::kmer::reverse_complement;
use helix::pipeline::checkpoint::{load_checkpoint, read_manifest};
use helix::pipeline::{self, CONTIGS_FILE, GFA_FILE};
use helix::Error;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const INSERT_SIZE: usize = 300;
const READ_LENGTH: usize = 100;

fn config(k: usize, output: &Path) -> AssemblyConfig {
    let mut config = AssemblyConfig {
        k,
        threads: 2,
        output_dir: output.to_path_buf(),
        ..Default::default()
    };
    config.paired.insert_size = INSERT_SIZE;
    config
}

fn run_in_memory(config: &AssemblyConfig, genome: &str) -> helix::Result<pipeline::AssemblyOutput> {
    let reads = common::tiled_reads(genome, READ_LENGTH, 10);
    let mut streams = common::single_streams(&reads);
    let mut paired = common::paired_streams(common::pairs(genome, INSERT_SIZE, READ_LENGTH, 20));
    pipeline::run(config, &mut streams, &mut paired)
}

#[test]
fn test_full_run_collects_paired_info() {
    let dir = TempDir::new().unwrap();
    let genome = common::genome(2000, 42);
    let output = run_in_memory(&config(21, dir.path()), &genome).unwrap();

    assert_eq!(output.graph.edge_count(), 2);
    assert_eq!(output.read_length, READ_LENGTH);
    let info = output.paired_info.as_ref().unwrap();
    // 86 pairs, each with its conjugate point
    assert_eq!(info.len(), 2);
    assert_eq!(info.total_weight(), 172.0);
    for (_, hist) in info.entries() {
        assert_eq!(hist.len(), 1);
        assert_eq!(hist.points()[0].distance, 0.0);
    }

    let fasta = fs::read_to_string(dir.path().join(CONTIGS_FILE)).unwrap();
    assert_eq!(fasta.matches('>').count(), 1);
    assert!(dir.path().join(GFA_FILE).exists());
    let manifest = read_manifest(&dir.path().join("saves"), Stage::PairedInfo).unwrap();
    assert_eq!((manifest.k, manifest.read_length), (21, READ_LENGTH));
}

#[test]
fn test_product_metric() {
    let dir = TempDir::new().unwrap();
    let genome = common::genome(2000, 42);
    let mut config = config(21, dir.path());
    config.paired.metric = PairedMetric::Product;
    let output = run_in_memory(&config, &genome).unwrap();
    // both mates map as one range of 80 k-mers
    assert_eq!(output.paired_info.unwrap().total_weight(), 172.0 * 6400.0);
}

#[test]
fn test_resume_from_saved_stage() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let genome = common::genome(2000, 7);
    run_in_memory(&config(21, first.path()), &genome).unwrap();

    let mut resumed = config(21, second.path());
    resumed.entry_point = Stage::PairedInfo;
    resumed.load_from = Some(first.path().to_path_buf());
    let mut streams: ReadStreams = Vec::new();
    let mut paired = common::paired_streams(common::pairs(&genome, INSERT_SIZE, READ_LENGTH, 20));
    let output = pipeline::run(&resumed, &mut streams, &mut paired).unwrap();

    assert_eq!(output.graph.edge_count(), 2);
    assert!(output.simplification.is_none());
    assert_eq!(output.paired_info.unwrap().total_weight(), 172.0);
    let saves = second.path().join("saves");
    for stage in Stage::ALL {
        assert!(saves.join(format!("{}.grp", stage.name())).exists(), "{}", stage);
    }
    assert!(saves.join("construction.cvr").exists());
    assert!(saves.join("construction.prd").exists());
    // carried over from the simplification checkpoint
    let flanking = output.flanking.unwrap();
    assert_eq!(flanking.len(), 2);
    assert!(output.graph.edges().all(|e| flanking.raw_coverage(e) > 0));
}

#[test]
fn test_resume_requires_every_skipped_checkpoint() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let genome = common::genome(2000, 7);
    run_in_memory(&config(21, first.path()), &genome).unwrap();
    let old_saves = first.path().join("saves");
    for entry in fs::read_dir(&old_saves).unwrap() {
        let path = entry.unwrap().path();
        if path.file_name().unwrap().to_string_lossy().starts_with("construction.") {
            fs::remove_file(path).unwrap();
        }
    }
    assert!(old_saves.join("simplification.grp").exists());

    let mut resumed = config(21, second.path());
    resumed.entry_point = Stage::PairedInfo;
    resumed.load_from = Some(first.path().to_path_buf());
    let mut paired = common::paired_streams(common::pairs(&genome, INSERT_SIZE, READ_LENGTH, 20));
    let result = pipeline::run(&resumed, &mut Vec::new(), &mut paired);
    assert!(matches!(
        result,
        Err(Error::CheckpointMissing { ref stage, .. }) if stage == "construction"
    ));
    let saves = second.path().join("saves");
    assert!(!saves.join("simplification.grp").exists());
    assert!(!saves.join("paired_info.grp").exists());
}

#[test]
fn test_additional_contigs_enter_the_graph() {
    let dir = TempDir::new().unwrap();
    let genome = common::genome(2000, 42);
    // a separate sequence no read covers
    let extra = common::genome(300, 1234);
    let contigs = dir.path().join("prior.fasta");
    fs::write(&contigs, format!(">prior_1\n{}\n{}\n", &extra[..150], &extra[150..])).unwrap();

    let mut config = config(21, &dir.path().join("out"));
    config.reads.additional_contigs = Some(contigs);
    let output = run_in_memory(&config, &genome).unwrap();

    assert_eq!(output.read_length, READ_LENGTH);
    assert!(output
        .graph
        .edges()
        .any(|e| output.graph.sequence(e) == extra.as_bytes()));
    let fasta = fs::read_to_string(dir.path().join("out").join(CONTIGS_FILE)).unwrap();
    assert_eq!(fasta.matches('>').count(), 2);
}

#[test]
fn test_k_mismatch_fails_before_any_stage() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let genome = common::genome(2000, 42);
    run_in_memory(&config(55, first.path()), &genome).unwrap();

    let mut resumed = config(21, second.path());
    resumed.entry_point = Stage::Simplification;
    resumed.load_from = Some(first.path().to_path_buf());
    let result = run_in_memory(&resumed, &genome);
    assert!(matches!(
        result,
        Err(Error::KmerLengthMismatch { expected: 21, found: 55, .. })
    ));
    let saves = second.path().join("saves");
    assert!(!saves.join("construction.grp").exists());
    assert!(!saves.join("simplification.grp").exists());
    assert!(!second.path().join(CONTIGS_FILE).exists());
}

#[test]
fn test_missing_checkpoint() {
    let empty = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let mut resumed = config(21, out.path());
    resumed.entry_point = Stage::Simplification;
    resumed.load_from = Some(empty.path().to_path_buf());
    assert!(matches!(
        run_in_memory(&resumed, &common::genome(2000, 42)),
        Err(Error::CheckpointMissing { .. })
    ));
}

fn write_fastq(path: &Path, reads: &[(String, String)]) {
    let mut file = fs::File::create(path).unwrap();
    for (name, seq) in reads {
        write!(file, "@{}\n{}\n+\n{}\n", name, seq, "I".repeat(seq.len())).unwrap();
    }
}

#[test]
fn test_fastq_libraries() {
    let dir = TempDir::new().unwrap();
    let genome = common::genome(2000, 42);
    let pairs = common::pairs(&genome, INSERT_SIZE, READ_LENGTH, 20);
    let left: Vec<(String, String)> = pairs
        .iter()
        .map(|p| (p.first.name.clone(), p.first.sequence.clone()))
        .collect();
    // second mates are stored as sequenced, on the opposite strand
    let right: Vec<(String, String)> = pairs
        .iter()
        .map(|p| {
            let rc = reverse_complement(p.second.sequence.as_bytes());
            (p.second.name.clone(), String::from_utf8(rc).unwrap())
        })
        .collect();
    let reads: Vec<(String, String)> = common::tiled_reads(&genome, READ_LENGTH, 10)
        .into_iter()
        .enumerate()
        .map(|(i, s)| (format!("r{}", i), s))
        .collect();
    write_fastq(&dir.path().join("lib_1.fq"), &left);
    write_fastq(&dir.path().join("lib_2.fq"), &right);
    write_fastq(&dir.path().join("single.fq"), &reads);

    let mut config = config(21, &dir.path().join("out"));
    config.reads.single = vec![dir.path().join("single.fq")];
    config.reads.left = vec![dir.path().join("lib_1.fq")];
    config.reads.right = vec![dir.path().join("lib_2.fq")];
    let (mut streams, mut paired) = pipeline::open_read_streams(&config).unwrap();
    assert_eq!((streams.len(), paired.len()), (2, 1));

    let output = pipeline::run(&config, &mut streams, &mut paired).unwrap();
    assert_eq!(output.paired_info.unwrap().total_weight(), 172.0);

    let loaded = load_checkpoint(&config.saves_dir(), Stage::PairedInfo, 21).unwrap();
    assert_eq!(loaded.graph.edge_count(), 2);
    assert_eq!(loaded.paired_info.total_weight(), 172.0);
}
