use criterion::{Criterion, black_box, criterion_group, criterion_main};
use fake_canvas_oauth::config::{OAuthConfig, RoleConfig};
use fake_canvas_oauth::registry::CredentialRegistry;
use fake_canvas_oauth::session::{FlowContext, MemorySessionStore, Session};
use std::sync::Arc;
use std::time::Duration;

fn is_ci_mode() -> bool {
    std::env::var("CI").is_ok() || std::env::var("QUICK_BENCH").is_ok()
}

fn registry() -> CredentialRegistry {
    let config = OAuthConfig {
        instructor: RoleConfig {
            access_token: Some("instructor-access-token".into()),
            ..Default::default()
        },
        student: RoleConfig {
            access_token: Some("student-access-token".into()),
            ..Default::default()
        },
    };
    CredentialRegistry::from_config(&config).unwrap()
}

fn benchmark_code_operations(c: &mut Criterion) {
    c.bench_function("issue_code", |b| {
        let registry = registry();
        b.iter(|| black_box(registry.issue_code(black_box("instructor"))));
    });

    c.bench_function("resolve_code", |b| {
        let registry = registry();
        // Populate so lookups hit a realistically sized map
        for _ in 0..10_000 {
            registry.issue_code("student");
        }
        let code = registry.issue_code("student");

        b.iter(|| black_box(registry.resolve_code(black_box(&code))));
    });

    c.bench_function("role_for_access_token", |b| {
        let registry = registry();
        b.iter(|| black_box(registry.role_for_access_token(black_box(Some("student-access-token")))));
    });
}

fn benchmark_concurrent_issuance(c: &mut Criterion) {
    let threads = if is_ci_mode() { 2 } else { 8 };

    c.bench_function("concurrent_issue_code", |b| {
        let registry = Arc::new(registry());
        b.iter(|| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let registry = registry.clone();
                    std::thread::spawn(move || {
                        for _ in 0..100 {
                            black_box(registry.issue_code("instructor"));
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

fn benchmark_session_store(c: &mut Criterion) {
    c.bench_function("flow_context_save_load", |b| {
        let store = MemorySessionStore::default();
        let session = Session::new(&store, "bench-session".to_string());
        let context = FlowContext {
            client_id: Some("bench-client".into()),
            redirect_uri: Some("https://app.test/cb".into()),
            state: Some("xyz".into()),
            scope: None,
        };

        b.iter(|| {
            context.save(&session);
            black_box(FlowContext::load(&session));
        });
    });
}

fn config() -> Criterion {
    if is_ci_mode() {
        Criterion::default()
            .sample_size(10)
            .measurement_time(Duration::from_secs(1))
            .warm_up_time(Duration::from_millis(200))
    } else {
        Criterion::default()
    }
}

criterion_group!(
    name = benches;
    config = config();
    targets = benchmark_code_operations, benchmark_concurrent_issuance, benchmark_session_store
);
criterion_main!(benches);
