/// Benchmarks for project parsing and reference resolution
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dbt_rag::project::DbtProject;
use dbt_rag::project::references::{DependencyGraph, extract_refs};
use tempfile::TempDir;

/// Helper to create a layered project: each model refs up to three models
/// from the layer above it
fn create_test_project(dir: &TempDir, count: usize) -> anyhow::Result<()> {
    let root = dir.path();
    std::fs::write(
        root.join("dbt_project.yml"),
        "name: bench\nmodel-paths: [\"models\"]\n",
    )?;

    let models_dir = root.join("models");
    std::fs::create_dir_all(&models_dir)?;

    let mut schema = String::from("version: 2\nmodels:\n");
    for i in 0..count {
        let refs: Vec<String> = (i.saturating_sub(3)..i)
            .map(|j| format!("{{{{ ref('model_{}') }}}}", j))
            .collect();
        let from = if refs.is_empty() {
            "{{ source('raw', 'events') }}".to_string()
        } else {
            refs.join("\njoin ")
        };
        let sql = format!(
            "select\n    id,\n    value * {} as value_{}\nfrom {}\n",
            i + 1,
            i,
            from
        );
        std::fs::write(models_dir.join(format!("model_{}.sql", i)), sql)?;

        schema.push_str(&format!(
            "  - name: model_{i}\n    description: Model number {i}\n    columns:\n      - name: value_{i}\n        description: Scaled value\n"
        ));
    }
    std::fs::write(models_dir.join("schema.yml"), schema)?;

    Ok(())
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for model_count in [10, 100, 500].iter() {
        let project_dir = TempDir::new().unwrap();
        create_test_project(&project_dir, *model_count).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_models", model_count)),
            model_count,
            |b, _| {
                b.iter(|| {
                    let project = DbtProject::open(black_box(project_dir.path())).unwrap();
                    project.build().unwrap()
                });
            },
        );
    }

    group.finish();
}

fn benchmark_dependencies(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependencies");

    for model_count in [100usize, 1000].iter() {
        let mut graph = DependencyGraph::new();
        for i in 0..*model_count {
            let sql: String = (i.saturating_sub(3)..i)
                .map(|j| format!("select * from {{{{ ref('model_{}') }}}}\n", j))
                .collect();
            graph.add_model(format!("model_{}", i), extract_refs(&sql));
        }
        let last = format!("model_{}", model_count - 1);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_models", model_count)),
            model_count,
            |b, _| {
                b.iter(|| graph.resolve(black_box(&last)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_build, benchmark_dependencies);
criterion_main!(benches);
