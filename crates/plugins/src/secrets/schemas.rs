use opsdeck_vault::ServiceSchema;

/// Services whose vault groups are provisioned out of the box.
pub fn builtin_schemas() -> Vec<ServiceSchema> {
    vec![
        ServiceSchema::new("redis")
            .title("Redis")
            .url("redis://localhost:6379")
            .attribute("port", "6379")
            .attribute("database", "0")
            .attribute("tls", "false")
            .attribute("enabled", "true"),
        ServiceSchema::new("postgres")
            .title("PostgreSQL")
            .url("postgres://localhost:5432")
            .user_name("postgres")
            .attribute("port", "5432")
            .attribute("database", "postgres")
            .attribute("sslmode", "prefer")
            .attribute("enabled", "true"),
        ServiceSchema::new("rabbitmq")
            .title("RabbitMQ")
            .url("amqp://localhost:5672")
            .user_name("guest")
            .attribute("port", "5672")
            .attribute("management_port", "15672")
            .attribute("vhost", "/")
            .attribute("enabled", "true"),
    ]
}

/// The built-in schema for `service`, or a bare one carrying only `enabled`.
pub fn schema_for(service: &str) -> ServiceSchema {
    builtin_schemas()
        .into_iter()
        .find(|schema| schema.service == service)
        .unwrap_or_else(|| ServiceSchema::new(service).attribute("enabled", "true"))
}

/// `services` filters the built-ins by name; empty selects all.
pub fn selected(services: &[String]) -> Vec<ServiceSchema> {
    builtin_schemas()
        .into_iter()
        .filter(|schema| services.is_empty() || services.iter().any(|name| *name == schema.service))
        .collect()
}
