//! Integration tests for the build and deploy stages with stub tooling and
//! local git remotes.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use shipway_core::{
    BuildRequest, BuilderConfig, DeployRequest, Environment, GitIdentity, PipelineError, Secret,
    Secrets,
};
use shipway_pipeline::{build_at, DeployStage, DockerBuilder};

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Bare remote plus a checkout seeded with one manifest for
/// `env/<env>/cluster-a/apps/tts-api`.
fn make_manifest_repo(root: &Path, environment: &str) -> PathBuf {
    let remote = root.join("manifests.git");
    std::fs::create_dir(&remote).unwrap();
    run_git(&remote, &["init", "--bare", "-b", "main"]);

    let clone = root.join("manifests");
    run_git(root, &["clone", remote.to_str().unwrap(), "manifests"]);
    run_git(&clone, &["config", "user.name", "seed"]);
    run_git(&clone, &["config", "user.email", "seed@example.com"]);
    run_git(&clone, &["checkout", "-B", "main"]);

    let app_dir = clone.join(format!("env/{environment}/cluster-a/apps/tts-api"));
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(
        app_dir.join("tts-api.yaml"),
        "apiVersion: apps/v1\nkind: Deployment\nspec:\n  containers:\n    - name: tts-api\n      image: registry/org/tts-api:seed\n",
    )
    .unwrap();
    run_git(&clone, &["add", "."]);
    run_git(&clone, &["commit", "-m", "seed manifests"]);
    run_git(&clone, &["push", "origin", "main"]);

    clone
}

fn stub_builder_config(dir: &Path, exit_code: i32) -> BuilderConfig {
    let stub = dir.join("stub-builder");
    std::fs::write(&stub, format!("#!/bin/sh\nexit {exit_code}\n")).unwrap();
    std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

    BuilderConfig {
        program: stub.display().to_string(),
        registry: "registry".to_string(),
        registry_user: "ci-bot".to_string(),
        context_dir: dir.to_path_buf(),
        dockerfile: dir.join("Dockerfile"),
        timeout_secs: 30,
    }
}

fn secrets() -> Secrets {
    Secrets {
        registry_credential: Secret::new("reg-cred"),
        build_ssh_key: Secret::new("ssh-key"),
        build_access_token: Secret::new("token"),
        manifest_credential: Secret::new("manifest-cred"),
    }
}

/// Full build stage over known inputs: org/tts-api @ main,
/// sha abc1234567, timestamp 1700000000.
#[tokio::test]
async fn test_build_stage_worked_example() {
    let dir = tempfile::tempdir().unwrap();
    let config = stub_builder_config(dir.path(), 0);
    let builder = DockerBuilder::new(config.clone());

    let request = BuildRequest {
        repository: "org/tts-api".to_string(),
        branch: "main".to_string(),
        commit_sha: "abc1234567".to_string(),
    };

    let outcome = build_at(&request, &config, &secrets(), &builder, 1700000000)
        .await
        .expect("build stage failed");

    assert_eq!(outcome.release.version, "abc1234-1700000000");
    assert_eq!(
        outcome.image.to_string(),
        "registry/org/tts-api:main-abc1234-1700000000"
    );
}

#[tokio::test]
async fn test_build_stage_fatal_on_builder_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = stub_builder_config(dir.path(), 1);
    let builder = DockerBuilder::new(config.clone());

    let request = BuildRequest {
        repository: "org/tts-api".to_string(),
        branch: "main".to_string(),
        commit_sha: "abc1234567".to_string(),
    };

    // The stub fails every invocation, so login is the first casualty.
    let err = build_at(&request, &config, &secrets(), &builder, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::CredentialFailure(_)));
}

#[tokio::test]
async fn test_deploy_stage_writes_and_pushes_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let checkout = make_manifest_repo(tmp.path(), "prod");

    let stage = DeployStage::new("registry", GitIdentity::default(), 30);
    let request = DeployRequest {
        repository: "org/tts-api".to_string(),
        branch: "main".to_string(),
        version: "abc1234-1700000000".to_string(),
        cluster: "cluster-a".to_string(),
        manifest_repo: checkout.clone(),
        trunk: "main".to_string(),
    };

    let outcome = stage.run(&request).await.expect("deploy stage failed");

    assert_eq!(outcome.target.environment, Environment::Prod);
    assert_eq!(
        outcome.manifest_path,
        "env/prod/cluster-a/apps/tts-api/tts-api.yaml"
    );
    assert!(outcome.pushed);
    assert_eq!(outcome.attempts, 1);

    // The remote trunk must carry the new reference.
    run_git(tmp.path(), &["clone", "manifests.git", "verify"]);
    let content = std::fs::read_to_string(
        tmp.path()
            .join("verify/env/prod/cluster-a/apps/tts-api/tts-api.yaml"),
    )
    .unwrap();
    assert!(content.contains("image: registry/org/tts-api:main-abc1234-1700000000"));
    assert!(content.contains("kind: Deployment"), "other lines untouched");
}

#[tokio::test]
async fn test_redeploy_same_version_is_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let checkout = make_manifest_repo(tmp.path(), "dev");

    let stage = DeployStage::new("registry", GitIdentity::default(), 30);
    let request = DeployRequest {
        repository: "org/tts-api".to_string(),
        branch: "dev-feature-x".to_string(),
        version: "cafe123-1700000001".to_string(),
        cluster: "cluster-a".to_string(),
        manifest_repo: checkout.clone(),
        trunk: "main".to_string(),
    };

    let first = stage.run(&request).await.unwrap();
    assert!(first.pushed);

    let second = stage.run(&request).await.unwrap();
    assert!(!second.pushed, "second deploy of the same version is a no-op");
}

/// Remote that rejects the first push the way a trunk that moved mid-flight
/// does, then accepts.
fn install_reject_once_hook(remote: &Path) {
    let hook = remote.join("hooks/pre-receive");
    std::fs::write(
        &hook,
        "#!/bin/sh\n\
         if [ ! -f rejected-once ]; then\n\
           : > rejected-once\n\
           echo 'failed to push some refs: fetch first (non-fast-forward)' >&2\n\
           exit 1\n\
         fi\n\
         exit 0\n",
    )
    .unwrap();
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
async fn test_deploy_retries_from_latest_after_push_rejection() {
    let tmp = tempfile::tempdir().unwrap();
    let checkout = make_manifest_repo(tmp.path(), "dev");
    install_reject_once_hook(&tmp.path().join("manifests.git"));

    let stage = DeployStage::new("registry", GitIdentity::default(), 30);
    let request = DeployRequest {
        repository: "org/tts-api".to_string(),
        branch: "dev".to_string(),
        version: "cafe123-1700000002".to_string(),
        cluster: "cluster-a".to_string(),
        manifest_repo: checkout,
        trunk: "main".to_string(),
    };

    let outcome = stage.run(&request).await.expect("retry should recover");
    assert!(outcome.pushed);
    assert_eq!(outcome.attempts, 2, "first push rejected, second lands");

    // The remote trunk carries the reference despite the rejection.
    run_git(tmp.path(), &["clone", "manifests.git", "verify-retry"]);
    let content = std::fs::read_to_string(
        tmp.path()
            .join("verify-retry/env/dev/cluster-a/apps/tts-api/tts-api.yaml"),
    )
    .unwrap();
    assert!(content.contains("cafe123-1700000002"));
}

#[tokio::test]
async fn test_deploy_surfaces_conflict_after_attempts_exhausted() {
    let tmp = tempfile::tempdir().unwrap();
    let checkout = make_manifest_repo(tmp.path(), "dev");
    let remote = tmp.path().join("manifests.git");

    // Pin what this checkout can fetch to a frozen branch, then advance the
    // real trunk from another clone. Every sync restores the stale state, so
    // every push is a genuine non-fast-forward rejection.
    run_git(&checkout, &["push", "origin", "main:frozen"]);
    run_git(tmp.path(), &["clone", remote.to_str().unwrap(), "racer"]);
    let racer = tmp.path().join("racer");
    run_git(&racer, &["config", "user.name", "racer"]);
    run_git(&racer, &["config", "user.email", "racer@example.com"]);
    run_git(&racer, &["commit", "--allow-empty", "-m", "trunk moved"]);
    run_git(&racer, &["push", "origin", "main"]);
    run_git(
        &checkout,
        &[
            "config",
            "remote.origin.fetch",
            "+refs/heads/frozen:refs/remotes/origin/main",
        ],
    );

    let stage = DeployStage::new("registry", GitIdentity::default(), 30);
    let request = DeployRequest {
        repository: "org/tts-api".to_string(),
        branch: "dev".to_string(),
        version: "cafe123-1700000003".to_string(),
        cluster: "cluster-a".to_string(),
        manifest_repo: checkout,
        trunk: "main".to_string(),
    };

    let err = stage.run(&request).await.unwrap_err();
    assert!(
        matches!(err, PipelineError::CommitPushConflict(_)),
        "expected CommitPushConflict after attempts ran out, got: {err}"
    );
}

#[tokio::test]
async fn test_deploy_fails_on_missing_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    // Manifest seeded for prod only, deploy targets dev.
    let checkout = make_manifest_repo(tmp.path(), "prod");

    let stage = DeployStage::new("registry", GitIdentity::default(), 30);
    let request = DeployRequest {
        repository: "org/tts-api".to_string(),
        branch: "dev".to_string(),
        version: "cafe123-1".to_string(),
        cluster: "cluster-a".to_string(),
        manifest_repo: checkout,
        trunk: "main".to_string(),
    };

    let err = stage.run(&request).await.unwrap_err();
    assert!(matches!(err, PipelineError::ManifestNotFound(_)));
}

#[tokio::test]
async fn test_deploy_fails_on_ambiguous_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let checkout = make_manifest_repo(tmp.path(), "dev");

    // Second image line makes the substitution ambiguous.
    let manifest = checkout.join("env/dev/cluster-a/apps/tts-api/tts-api.yaml");
    let mut content = std::fs::read_to_string(&manifest).unwrap();
    content.push_str("      image: registry/org/sidecar:1\n");
    std::fs::write(&manifest, content).unwrap();
    run_git(&checkout, &["add", "."]);
    run_git(&checkout, &["commit", "-m", "add sidecar image"]);
    run_git(&checkout, &["push", "origin", "main"]);

    let stage = DeployStage::new("registry", GitIdentity::default(), 30);
    let request = DeployRequest {
        repository: "org/tts-api".to_string(),
        branch: "dev".to_string(),
        version: "cafe123-1".to_string(),
        cluster: "cluster-a".to_string(),
        manifest_repo: checkout,
        trunk: "main".to_string(),
    };

    let err = stage.run(&request).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::NoImageLineFound { matches: 2, .. }
    ));
}
