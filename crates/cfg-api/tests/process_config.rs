use cfg_api::{
    default_of, default_of_with, schema_problems, Cfg, CfgNode, LoadOptions, Parameters,
    Problems, SchemaBuilder,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq)]
struct Connection {
    name: String,
    provider: String,
    server: String,
    port: u16,
    timeout: i32,
    delimiter: char,
}

impl CfgNode for Connection {
    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema.field("name", |c| &mut c.name).required().unique();
        schema
            .field("provider", |c| &mut c.provider)
            .domain("sqlserver,postgres,sqlite")
            .ignore_case()
            .default_value("sqlserver");
        schema
            .field("server", |c| &mut c.server)
            .default_value("localhost");
        schema.field("port", |c| &mut c.port);
        schema.field("timeout", |c| &mut c.timeout).default_value(30);
        schema.field("delimiter", |c| &mut c.delimiter).default_value(',');
    }

    fn modify(&mut self) {
        self.provider = self.provider.to_lowercase();
    }
}

#[derive(Debug, Default, Clone)]
struct Field {
    name: String,
    data_type: String,
    primary_key: bool,
    length: i32,
}

impl CfgNode for Field {
    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema.field("name", |f| &mut f.name).required().unique();
        schema
            .field("type", |f| &mut f.data_type)
            .domain("string,int,bool,datetime,guid")
            .default_value("string");
        schema.field("primary-key", |f| &mut f.primary_key);
        schema.field("length", |f| &mut f.length).default_value(64);
    }
}

#[derive(Debug, Default, Clone)]
struct Entity {
    name: String,
    connection: String,
    id: Uuid,
    modified: chrono::NaiveDateTime,
    fields: Vec<Field>,
}

impl CfgNode for Entity {
    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema.field("name", |e| &mut e.name).required().unique();
        schema
            .field("connection", |e| &mut e.connection)
            .default_value("input");
        schema.field("id", |e| &mut e.id);
        schema.field("modified", |e| &mut e.modified);
        schema
            .collection("fields", |e| &mut e.fields)
            .required()
            .shared("type");
    }

    fn validate(&self, problems: &mut Problems) {
        if !self.fields.iter().any(|field| field.primary_key) {
            problems.add(format!("Entity '{}' has no primary key.", self.name));
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Process {
    name: String,
    mode: String,
    flatten: bool,
    budget: Decimal,
    connections: Vec<Connection>,
    entities: Vec<Entity>,
    tags: Vec<String>,
}

impl CfgNode for Process {
    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema.field("name", |p| &mut p.name).required();
        schema
            .field("mode", |p| &mut p.mode)
            .domain("init,default")
            .default_value("default");
        schema.field("flatten", |p| &mut p.flatten);
        schema.field("budget", |p| &mut p.budget);
        schema
            .collection("connections", |p| &mut p.connections)
            .required();
        schema.collection("entities", |p| &mut p.entities);
        schema.list("tags", |p| &mut p.tags);
    }

    fn validate(&self, problems: &mut Problems) {
        for entity in &self.entities {
            if !self
                .connections
                .iter()
                .any(|connection| connection.name == entity.connection)
            {
                problems.add(format!(
                    "The '{}' entity references a missing connection '{}'.",
                    entity.name, entity.connection
                ));
            }
        }
    }
}

const ORDERS: &str = r#"
<cfg name="orders" flatten="True" budget="$1,250.75">
  <connections>
    <add name="input" provider="SqlServer" server="@(server)" port="1433" delimiter="|"/>
    <add name="output" provider="postgres" timeout="120"/>
  </connections>
  <entities>
    <add name="Order" id="67e55044-10b1-426f-9247-bb680e5fe0c8" modified="2024-03-01T08:30:00">
      <fields type="int">
        <add name="OrderId" primary-key="true"/>
        <add name="Customer" type="string" length="128"/>
        <add name="Total"/>
      </fields>
    </add>
  </entities>
  <tags>
    <add value="nightly"/>
    <add value="finance"/>
  </tags>
</cfg>"#;

fn parameters(entries: &[(&str, &str)]) -> Parameters {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

#[test]
fn realistic_process_loads_cleanly() {
    let cfg = Cfg::<Process>::from_xml(ORDERS, Some(&parameters(&[("server", "sql01")])));

    assert!(cfg.is_valid(), "unexpected problems: {:?}", cfg.problems());
    assert_eq!(cfg.name, "orders");
    assert_eq!(cfg.mode, "default");
    assert!(cfg.flatten);
    assert_eq!(cfg.budget, Decimal::new(125075, 2));
    assert_eq!(cfg.tags, vec!["nightly", "finance"]);

    let input = &cfg.connections[0];
    assert_eq!(input.provider, "sqlserver");
    assert_eq!(input.server, "sql01");
    assert_eq!(input.port, 1433);
    assert_eq!(input.timeout, 30);
    assert_eq!(input.delimiter, '|');

    let output = &cfg.connections[1];
    assert_eq!(output.server, "localhost");
    assert_eq!(output.timeout, 120);
    assert_eq!(output.delimiter, ',');

    let order = &cfg.entities[0];
    assert_eq!(order.connection, "input");
    assert_eq!(
        order.id,
        Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").expect("valid uuid")
    );
    assert_eq!(
        order.modified,
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(8, 30, 0))
            .expect("valid timestamp")
    );
    let types: Vec<&str> = order.fields.iter().map(|f| f.data_type.as_str()).collect();
    assert_eq!(types, vec!["int", "string", "int"]);
    assert_eq!(order.fields[1].length, 128);
    assert_eq!(order.fields[2].length, 64);
}

#[test]
fn problems_are_listed_parent_first_in_document_order() {
    let xml = r#"
<cfg name="shop" mode="sometimes">
  <connections>
    <add name="input" provider="oracle"/>
    <add name="input"/>
  </connections>
  <entities>
    <add name="Order" connection="warehouse">
      <fields>
        <add name="Id" length="many"/>
      </fields>
    </add>
  </entities>
</cfg>"#;
    let cfg = Cfg::<Process>::from_xml(xml, None);
    let problems = cfg.problems();

    assert_eq!(problems.len(), 6, "problems: {:?}", problems);
    assert_eq!(
        problems[..5],
        [
            "The root element has an invalid value of 'sometimes' in the 'mode' attribute.  \
             The valid domain is: init, default.",
            "You set a duplicate 'name' value 'input' in 'connections'.",
            "The 'Order' entity references a missing connection 'warehouse'.",
            "A 'connections' 'add' element has an invalid value of 'oracle' in the 'provider' \
             attribute.  The valid domain is: sqlserver, postgres, sqlite.",
            "Entity 'Order' has no primary key.",
        ]
    );
    assert!(problems[5].starts_with("Could not set 'length' to 'many' inside 'fields' 'add'."));
}

#[test]
fn nested_missing_collections_name_their_parent() {
    let cfg = Cfg::<Process>::from_xml(
        r#"<cfg name="x">
  <connections><add name="input"/></connections>
  <entities><add name="Order"/></entities>
</cfg>"#,
        None,
    );
    assert_eq!(
        cfg.problems(),
        vec![
            "An 'entities' 'add' element is missing a 'fields' element.",
            "Entity 'Order' has no primary key.",
        ]
    );
}

#[test]
fn environment_is_chosen_by_parameter() {
    let xml = r#"
<cfg name="shop">
  <environments default="@(environment)">
    <add name="dev">
      <parameters>
        <add name="server" value="dev-sql"/>
        <add name="port" value="1433"/>
      </parameters>
    </add>
    <add name="prod">
      <parameters>
        <add name="server" value="prod-sql"/>
        <add name="port" value="5432"/>
      </parameters>
    </add>
  </environments>
  <connections>
    <add name="input" server="@(server)" port="@(port)"/>
  </connections>
</cfg>"#;

    let prod = Cfg::<Process>::from_xml(xml, Some(&parameters(&[("environment", "prod")])));
    assert!(prod.is_valid(), "unexpected problems: {:?}", prod.problems());
    assert_eq!(prod.connections[0].server, "prod-sql");
    assert_eq!(prod.connections[0].port, 5432);

    let fallback = Cfg::<Process>::from_xml(xml, None);
    assert!(fallback.is_valid(), "unexpected problems: {:?}", fallback.problems());
    assert_eq!(fallback.connections[0].server, "dev-sql");

    let pinned = Cfg::<Process>::from_xml(
        xml,
        Some(&parameters(&[("environment", "prod"), ("server", "override")])),
    );
    assert_eq!(pinned.connections[0].server, "override");
    assert_eq!(pinned.connections[0].port, 5432);
}

#[test]
fn load_options_can_rename_parameter_attributes() {
    let xml = r#"
<cfg name="@(app)">
  <environments>
    <add name="only">
      <parameters><add key="app" text="billing"/></parameters>
    </add>
  </environments>
  <connections><add name="input"/></connections>
</cfg>"#;
    let options: LoadOptions = serde_json::from_str(
        r#"{ "environment": { "nameAttribute": "key", "valueAttribute": "text" } }"#,
    )
    .expect("options should parse");

    let mut cfg = Cfg::<Process>::new();
    assert!(cfg.load_with(xml, &options));
    assert_eq!(cfg.name, "billing");
}

#[test]
fn reloading_starts_from_defaults() {
    let mut cfg = Cfg::<Process>::from_xml(ORDERS, None);
    assert_eq!(
        cfg.problems(),
        vec!["You're missing a value for @(server)."]
    );
    assert_eq!(cfg.connections[0].server, "@(server)");

    assert!(cfg.load(
        r#"<cfg name="small"><connections><add name="only"/></connections></cfg>"#,
        None
    ));
    assert_eq!(cfg.name, "small");
    assert!(!cfg.flatten);
    assert!(cfg.entities.is_empty());
    assert!(cfg.tags.is_empty());
}

#[test]
fn malformed_documents_report_a_single_problem() {
    let cfg = Cfg::<Process>::from_xml(r#"<cfg name="x"><connections></cfg>"#, None);
    let problems = cfg.problems();
    assert_eq!(problems.len(), 1);
    assert!(problems[0].starts_with("Could not parse the configuration."));
    assert_eq!(cfg.mode, "default");
}

#[test]
fn defaults_are_available_without_a_document() {
    let connection: Connection = default_of();
    assert_eq!(connection.provider, "sqlserver");
    assert_eq!(connection.server, "localhost");
    assert_eq!(connection.timeout, 30);

    let custom = default_of_with(|connection: &mut Connection| {
        connection.provider = "SQLite".to_string();
    });
    assert_eq!(custom.provider, "sqlite");
    assert!(schema_problems::<Process>().is_empty());
}
