//! Built-in tasks.
//!
//! Each builder turns the settings into a concrete pipeline. Arguments are
//! written as `${KEY}` templates; `DATABASE_URL` and `SECRET_KEY_BASE` are
//! passed by name so docker reads them from the environment overlay instead
//! of the command line.

use tracing::warn;

use dockyard_config::Settings;
use dockyard_core::{CommandSpec, ComposeAction, Pipeline, ResourceDescriptor, Step};

use crate::task::{Task, TaskId};

/// Every built-in task, root first.
pub fn builtin() -> Vec<Task> {
    vec![
        Task::new(
            TaskId::root("configure"),
            "initial set up: dependencies, database, init and server images",
            configure,
        ),
        Task::new(TaskId::namespaced("db", "start"), "start the database", db_start),
        Task::new(TaskId::namespaced("db", "stop"), "stop the database", db_stop),
        Task::new(
            TaskId::namespaced("docker", "build-server"),
            "build the server image",
            build_server,
        ),
        Task::new(
            TaskId::namespaced("docker", "build-init"),
            "build the database init image",
            build_init,
        ),
        Task::new(
            TaskId::namespaced("docker", "run-init"),
            "run the init container against the database",
            run_init,
        ),
        Task::new(
            TaskId::namespaced("docker", "run-server"),
            "start the database and the server container",
            run_server,
        ),
        Task::new(
            TaskId::namespaced("docker", "stop-server"),
            "stop the server and the database",
            stop_server,
        ),
        Task::new(
            TaskId::namespaced("kube", "create-dev"),
            "create the development cluster and its local registry",
            create_dev,
        ),
        Task::new(
            TaskId::namespaced("kube", "delete-dev"),
            "delete the development cluster and stop the registry",
            delete_dev,
        ),
        Task::new(
            TaskId::namespaced("kube", "deploy-services"),
            "install the database chart into the cluster",
            deploy_services,
        ),
        Task::new(
            TaskId::namespaced("kube", "push"),
            "push the server and init images to the local registry",
            kube_push,
        ),
        Task::new(
            TaskId::namespaced("ci", "unit-test"),
            "run the unit tests",
            unit_test,
        )
        .with_success_message("All tests passed!"),
        Task::new(
            TaskId::namespaced("ci", "build"),
            "build images tagged for the remote registry",
            ci_build,
        ),
        Task::new(
            TaskId::namespaced("ci", "push"),
            "push images to the remote registry",
            ci_push,
        ),
    ]
}

fn command(settings: &Settings, program: &str, templates: &[&str]) -> CommandSpec {
    for template in templates {
        let missing = settings.unresolved(template);
        if !missing.is_empty() {
            warn!(template, ?missing, "unresolved placeholders");
        }
    }
    CommandSpec::new(program, settings.interpolate_all(templates))
}

fn docker(settings: &Settings, templates: &[&str]) -> CommandSpec {
    command(settings, "docker", templates)
}

fn value(settings: &Settings, key: &str) -> String {
    settings.interpolate(&format!("${{{}}}", key))
}

fn mix_deps(settings: &Settings) -> Step {
    Step::command("mix deps.get", command(settings, "mix", &["deps.get"]))
}

/// `image` is a template such as `${APP_NAME}`, tagged with the commit and `latest`.
fn build_image(settings: &Settings, image: &str, dockerfile: &str) -> CommandSpec {
    let commit_tag = format!("{}:${{GIT_COMMIT}}", image);
    let latest_tag = format!("{}:latest", image);
    docker(
        settings,
        &[
            "build",
            "--build-arg",
            "DATABASE_URL",
            "--build-arg",
            "SECRET_KEY_BASE",
            "-t",
            &commit_tag,
            "-t",
            &latest_tag,
            "-f",
            dockerfile,
            ".",
        ],
    )
}

fn compose(settings: &Settings, name: &str, action: ComposeAction) -> Pipeline {
    let dir = value(settings, "COMPOSE_DIR");
    Pipeline::new(name).step(Step::scoped(
        "compose stack",
        dir,
        Pipeline::new("compose").step(Step::compose(format!("compose {}", action), action)),
    ))
}

fn db_start(settings: &Settings) -> Pipeline {
    compose(settings, "db:start", ComposeAction::Up)
}

fn db_stop(settings: &Settings) -> Pipeline {
    compose(settings, "db:stop", ComposeAction::Down)
}

fn compose_requirements(settings: &Settings) -> Pipeline {
    Pipeline::new("compose requirements")
        .step(Step::ensure(
            "postgres network",
            ResourceDescriptor::network(value(settings, "POSTGRES_NETWORK")),
        ))
        .step(Step::ensure(
            "postgres volume",
            ResourceDescriptor::volume(value(settings, "POSTGRES_VOLUME")),
        ))
}

fn configure(settings: &Settings) -> Pipeline {
    Pipeline::new("configure")
        .step(mix_deps(settings))
        .step(Step::nested(
            "compose requirements",
            compose_requirements(settings),
        ))
        .step(Step::nested("docker:build-init", build_init(settings)))
        .step(Step::nested("db:start", db_start(settings)))
        .step(Step::nested("docker:run-init", run_init(settings)))
        .step(Step::nested("db:stop", db_stop(settings)))
        .step(Step::nested("docker:build-server", build_server(settings)))
}

fn build_server(settings: &Settings) -> Pipeline {
    Pipeline::new("docker:build-server").step(Step::command(
        "build server image",
        build_image(settings, "${APP_NAME}", "${SERVER_DOCKERFILE}"),
    ))
}

fn build_init(settings: &Settings) -> Pipeline {
    Pipeline::new("docker:build-init").step(Step::command(
        "build init image",
        build_image(settings, "${INIT_NAME}", "${INIT_DOCKERFILE}"),
    ))
}

fn run_init(settings: &Settings) -> Pipeline {
    Pipeline::new("docker:run-init").step(Step::command(
        "run init container",
        docker(
            settings,
            &[
                "run",
                "-e",
                "DATABASE_URL",
                "-e",
                "SECRET_KEY_BASE",
                "--network",
                "${POSTGRES_NETWORK}",
                "${INIT_NAME}:latest",
            ],
        ),
    ))
}

fn run_server(settings: &Settings) -> Pipeline {
    Pipeline::new("docker:run-server")
        .step(Step::nested("db:start", db_start(settings)))
        .step(Step::command(
            "start server container",
            docker(
                settings,
                &[
                    "run",
                    "-e",
                    "DATABASE_URL",
                    "-e",
                    "SECRET_KEY_BASE",
                    "--network",
                    "${POSTGRES_NETWORK}",
                    "-p",
                    "${SERVER_PORT}:4000",
                    "-d",
                    "--name",
                    "${SERVER_CONTAINER}",
                    "${APP_NAME}:latest",
                ],
            ),
        ))
}

fn stop_server(settings: &Settings) -> Pipeline {
    Pipeline::new("docker:stop-server")
        .step(Step::command(
            "stop server container",
            docker(settings, &["stop", "${SERVER_CONTAINER}"]),
        ))
        .step(Step::nested("db:stop", db_stop(settings)))
        .step(Step::command(
            "remove server container",
            docker(settings, &["rm", "${SERVER_CONTAINER}"]),
        ))
}

fn create_dev(settings: &Settings) -> Pipeline {
    let dir = value(settings, "KUBE_DIR");
    let registry_name = value(settings, "REGISTRY_NAME");
    let registry = ResourceDescriptor::registry(
        registry_name.clone(),
        &value(settings, "REGISTRY_PORT"),
        value(settings, "REGISTRY_IMAGE"),
    )
    .on_network(value(settings, "POSTGRES_NETWORK"));

    let cluster = Pipeline::new("cluster")
        .step(Step::ensure("local registry", registry))
        .step(Step::command(
            "kind create cluster",
            command(
                settings,
                "kind",
                &[
                    "create",
                    "cluster",
                    "--config",
                    "${CLUSTER_CONFIG}",
                    "--name",
                    "${DEV_CLUSTER}",
                ],
            ),
        ))
        .step(Step::attach(
            "attach registry to cluster network",
            value(settings, "KIND_NETWORK"),
            registry_name,
        ));

    Pipeline::new("kube:create-dev").step(Step::scoped("cluster", dir, cluster))
}

fn delete_dev(settings: &Settings) -> Pipeline {
    Pipeline::new("kube:delete-dev")
        .step(Step::command(
            "kind delete cluster",
            command(
                settings,
                "kind",
                &["delete", "cluster", "--name", "${DEV_CLUSTER}"],
            ),
        ))
        .step(Step::command(
            "stop local registry",
            docker(settings, &["stop", "${REGISTRY_NAME}"]),
        ))
}

fn deploy_services(settings: &Settings) -> Pipeline {
    let dir = value(settings, "CHART_DIR");
    Pipeline::new("kube:deploy-services").step(Step::scoped(
        "chart",
        dir,
        Pipeline::new("chart").step(Step::command(
            "helm install",
            command(settings, "helm", &["install", "${HELM_RELEASE}", "."]),
        )),
    ))
}

fn kube_push(settings: &Settings) -> Pipeline {
    let local = "localhost:${REGISTRY_PORT}";
    let mut pipeline = Pipeline::new("kube:push");
    for image in ["${APP_NAME}", "${INIT_NAME}"] {
        let source = format!("{}:latest", image);
        let target = format!("{}/{}:latest", local, image);
        pipeline = pipeline.step(Step::command(
            format!("tag {}", settings.interpolate(image)),
            docker(settings, &["tag", &source, &target]),
        ));
    }
    for image in ["${APP_NAME}", "${INIT_NAME}"] {
        let target = format!("{}/{}:latest", local, image);
        pipeline = pipeline.step(Step::command(
            format!("push {}", settings.interpolate(image)),
            docker(settings, &["push", &target]),
        ));
    }
    pipeline
}

fn unit_test(settings: &Settings) -> Pipeline {
    Pipeline::new("ci:unit-test")
        .step(mix_deps(settings))
        .step(Step::command("mix test", command(settings, "mix", &["test"])))
}

const REMOTE: &str = "${REMOTE_REGISTRY}/${GITHUB_OWNER}";

fn ci_build(settings: &Settings) -> Pipeline {
    let server = format!("{}/${{APP_NAME}}", REMOTE);
    let init = format!("{}/${{INIT_NAME}}", REMOTE);
    Pipeline::new("ci:build")
        .step(Step::command(
            "build server image",
            build_image(settings, &server, "${SERVER_DOCKERFILE}"),
        ))
        .step(Step::command(
            "build init image",
            build_image(settings, &init, "${INIT_DOCKERFILE}"),
        ))
}

fn ci_push(settings: &Settings) -> Pipeline {
    let mut pipeline = Pipeline::new("ci:push");
    for tag in ["latest", "${GIT_COMMIT}"] {
        for image in ["${APP_NAME}", "${INIT_NAME}"] {
            let target = format!("{}/{}:{}", REMOTE, image, tag);
            pipeline = pipeline.step(Step::command(
                format!("push {}", settings.interpolate(&target)),
                docker(settings, &["push", &target]),
            ));
        }
    }
    pipeline
}
