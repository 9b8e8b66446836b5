//! Design automation service.
//!
//! Engines, app bundles, activities and work items of the Design Automation v3 API.
//! App bundles and activities share the same resource layout (versions and aliases),
//! so both go through the same private helpers.

use crate::client::{Payload, RequestExecutor, RequestSpec};
use crate::errors::{AuthenticationError, ForgeError, ForgeResult};
use crate::pagination::{PageIterator, PaginationStyle};
use crate::transport::encode_component as enc;
use crate::types::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Root path of the design automation API.
pub const ROOT_PATH: &str = "/da/us-east/v3";

/// Scopes for all design automation operations.
pub const SCOPES: &[&str] = &["code:all"];

/// Fully qualified design automation id: `owner.id+alias`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DesignAutomationId {
    /// Owner (nickname or client id).
    pub owner: String,
    /// Short id.
    pub id: String,
    /// Alias, for example `prod` or `$LATEST`.
    pub alias: String,
}

impl DesignAutomationId {
    /// Creates an id from its parts.
    pub fn new(owner: impl Into<String>, id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            id: id.into(),
            alias: alias.into(),
        }
    }

    /// Parses `owner.id+alias`, returning `None` if the string does not match.
    pub fn parse(s: &str) -> Option<Self> {
        let (qualified, alias) = s.split_once('+')?;
        let (owner, id) = qualified.split_once('.')?;

        let word = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
        let alias_ok = !alias.is_empty() && alias.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$');

        if word(owner) && word(id) && alias_ok {
            Some(Self::new(owner, id, alias))
        } else {
            None
        }
    }
}

impl FromStr for DesignAutomationId {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ForgeError::request(format!("Could not parse id: {}", s)))
    }
}

impl fmt::Display for DesignAutomationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}+{}", self.owner, self.id, self.alias)
    }
}

/// Engine family, selected by the id part of an engine id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// `Autodesk.AutoCAD+*`
    AutoCad,
    /// `Autodesk.3dsMax+*`
    ThreeDsMax,
    /// `Autodesk.Revit+*`
    Revit,
    /// `Autodesk.Inventor+*`
    Inventor,
}

impl EngineKind {
    /// Determines the engine family of an engine id such as `Autodesk.AutoCAD+23`.
    pub fn from_engine(engine: &str) -> ForgeResult<Self> {
        let id = DesignAutomationId::parse(engine)
            .ok_or_else(|| ForgeError::request(format!("Could not parse engine id: {}", engine)))?;
        match id.id.as_str() {
            "AutoCAD" => Ok(EngineKind::AutoCad),
            "3dsMax" => Ok(EngineKind::ThreeDsMax),
            "Revit" => Ok(EngineKind::Revit),
            "Inventor" => Ok(EngineKind::Inventor),
            other => Err(ForgeError::request(format!("Unsupported engine: {}", other))),
        }
    }

    fn executable(&self) -> &'static str {
        match self {
            EngineKind::AutoCad => "accoreconsole.exe",
            EngineKind::ThreeDsMax => "3dsmaxbatch.exe",
            EngineKind::Revit => "revitcoreconsole.exe",
            EngineKind::Inventor => "InventorCoreConsole.exe",
        }
    }
}

/// Activity command line: a list for console engines, a single string for 3ds Max.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandLine {
    /// Single command.
    Single(String),
    /// One or more commands.
    Multiple(Vec<String>),
}

/// Parameter entry of an activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityParameter {
    /// HTTP verb.
    pub verb: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Local file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
    /// Whether the parameter is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Whether the parameter is a zip archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<bool>,
    /// Whether the parameter is fetched on demand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ondemand: Option<bool>,
}

impl ActivityParameter {
    fn from_param(param: &ActivityParam, default_verb: &str) -> Self {
        Self {
            verb: param.verb.clone().unwrap_or_else(|| default_verb.to_string()),
            description: param.description.clone(),
            local_name: param.local_name.clone(),
            required: param.required,
            zip: param.zip,
            ondemand: param.ondemand,
        }
    }
}

/// Activity settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySettings {
    /// Script passed to the engine.
    pub script: String,
}

/// Body of an activity create or update request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityConfig {
    /// Activity id; only sent on creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Command line.
    pub command_line: CommandLine,
    /// Parameters by name.
    pub parameters: BTreeMap<String, ActivityParameter>,
    /// Description.
    pub description: String,
    /// Engine id.
    pub engine: String,
    /// Fully qualified app bundle ids.
    pub appbundles: Vec<String>,
    /// Settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<ActivitySettings>,
}

/// Description of an activity running a single app bundle.
#[derive(Debug, Clone, Default)]
pub struct ActivityRequest {
    /// Engine id, for example `Autodesk.AutoCAD+23`.
    pub engine: String,
    /// Short name of the app bundle.
    pub bundle_name: String,
    /// Alias of the app bundle.
    pub bundle_alias: String,
    /// Description.
    pub description: String,
    /// Input parameters; verbs default to `get`.
    pub inputs: Vec<ActivityParam>,
    /// Output parameters; verbs default to `put`.
    pub outputs: Vec<ActivityParam>,
    /// Script; only used by AutoCAD and 3ds Max.
    pub script: Option<String>,
}

/// Builds the activity body for an engine.
///
/// `owner` is the client id the app bundle belongs to.
pub fn build_activity_config(id: Option<&str>, owner: &str, request: &ActivityRequest) -> ForgeResult<ActivityConfig> {
    let kind = EngineKind::from_engine(&request.engine)?;
    let mut parameters = BTreeMap::new();

    let command_line = if kind == EngineKind::ThreeDsMax {
        if request.inputs.len() > 1 {
            return Err(ForgeError::request("3dsMax engine only supports single input file"));
        }
        let mut command = format!("$(engine.path)\\{}", kind.executable());
        if let Some(input) = request.inputs.first() {
            command.push_str(&format!(" -sceneFile \"$(args[{}].path)\"", input.name));
        }
        if request.script.is_some() {
            command.push_str(" \"$(settings[script].path)\"");
        }
        CommandLine::Single(command)
    } else {
        let mut command = format!(
            "$(engine.path)\\{} /al $(appbundles[{}].path)",
            kind.executable(),
            request.bundle_name
        );
        if !request.inputs.is_empty() {
            command.push_str(" /i");
            for input in &request.inputs {
                command.push_str(&format!(" $(args[{}].path)", input.name));
            }
        }
        if kind == EngineKind::AutoCad && request.script.is_some() {
            command.push_str(" /s $(settings[script].path)");
        }
        CommandLine::Multiple(vec![command])
    };

    for input in &request.inputs {
        parameters.insert(input.name.clone(), ActivityParameter::from_param(input, "get"));
    }
    for output in &request.outputs {
        parameters.insert(output.name.clone(), ActivityParameter::from_param(output, "put"));
    }

    let settings = match kind {
        EngineKind::AutoCad | EngineKind::ThreeDsMax => request
            .script
            .clone()
            .map(|script| ActivitySettings { script }),
        EngineKind::Revit | EngineKind::Inventor => None,
    };

    Ok(ActivityConfig {
        id: id.filter(|id| !id.is_empty()).map(str::to_string),
        command_line,
        parameters,
        description: request.description.clone(),
        engine: request.engine.clone(),
        appbundles: vec![format!("{}.{}+{}", owner, request.bundle_name, request.bundle_alias)],
        settings,
    })
}

/// Argument entry of a work item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkItemArgument {
    verb: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optional: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path_in_zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<HashMap<String, String>>,
}

impl WorkItemArgument {
    fn from_param(param: &WorkItemParam, default_verb: &str) -> Self {
        Self {
            verb: param.verb.clone().unwrap_or_else(|| default_verb.to_string()),
            url: param.url.clone(),
            local_name: param.local_name.clone(),
            optional: param.optional,
            path_in_zip: param.path_in_zip.clone(),
            headers: param.headers.clone(),
        }
    }
}

#[derive(Clone, Copy)]
enum Collection {
    AppBundles,
    Activities,
}

impl Collection {
    fn path(&self) -> &'static str {
        match self {
            Collection::AppBundles => "/appbundles",
            Collection::Activities => "/activities",
        }
    }
}

/// Service for design automation.
pub struct DesignAutomationService {
    executor: Arc<RequestExecutor>,
}

impl DesignAutomationService {
    /// Creates a new design automation service.
    pub(crate) fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    fn pages<T: DeserializeOwned>(&self, endpoint: &str) -> PageIterator<T> {
        PageIterator::new(
            self.executor.clone(),
            format!("{}{}", ROOT_PATH, endpoint),
            SCOPES,
            PaginationStyle::Token,
        )
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ForgeResult<T> {
        self.executor
            .execute_json(RequestSpec::get(format!("{}{}", ROOT_PATH, endpoint)).scopes(SCOPES))
            .await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(&self, spec: RequestSpec, body: &B) -> ForgeResult<T> {
        self.executor
            .execute_json(spec.payload(Payload::json(body)?).scopes(SCOPES))
            .await
    }

    async fn delete(&self, endpoint: &str) -> ForgeResult<()> {
        self.executor
            .execute(RequestSpec::delete(format!("{}{}", ROOT_PATH, endpoint)).scopes(SCOPES))
            .await?;
        Ok(())
    }

    fn owner(&self) -> ForgeResult<String> {
        self.executor.client_id().ok_or_else(|| {
            AuthenticationError::ClientCredentialsRequired("Cannot create activity without client ID".to_string())
                .into()
        })
    }

    // Shared app bundle / activity operations

    async fn versioned<T: DeserializeOwned>(&self, c: Collection, name: &str, version: u32) -> ForgeResult<T> {
        self.get(&format!("{}/{}/versions/{}", c.path(), enc(name), version)).await
    }

    async fn create_alias(&self, c: Collection, name: &str, alias: &str, version: u32) -> ForgeResult<Alias> {
        let path = format!("{}{}/{}/aliases", ROOT_PATH, c.path(), enc(name));
        self.send_json(RequestSpec::post(path), &json!({ "id": alias, "version": version }))
            .await
    }

    async fn update_alias(&self, c: Collection, name: &str, alias: &str, version: u32) -> ForgeResult<Alias> {
        let path = format!("{}{}/{}/aliases/{}", ROOT_PATH, c.path(), enc(name), enc(alias));
        self.send_json(RequestSpec::patch(path), &json!({ "version": version }))
            .await
    }

    // Engines

    /// Iterates over engine ids.
    pub fn iterate_engines(&self) -> PageIterator<String> {
        self.pages("/engines")
    }

    /// Lists all engine ids.
    pub async fn list_engines(&self) -> ForgeResult<Vec<String>> {
        self.iterate_engines().collect_all().await
    }

    /// Gets engine details.
    pub async fn get_engine(&self, engine_id: &str) -> ForgeResult<EngineDetail> {
        self.get(&format!("/engines/{}", enc(engine_id))).await
    }

    // App bundles

    /// Iterates over app bundle ids.
    pub fn iterate_app_bundles(&self) -> PageIterator<String> {
        self.pages("/appbundles")
    }

    /// Lists all app bundle ids.
    pub async fn list_app_bundles(&self) -> ForgeResult<Vec<String>> {
        self.iterate_app_bundles().collect_all().await
    }

    /// Gets app bundle details by short or fully qualified id.
    pub async fn get_app_bundle(&self, bundle_id: &str) -> ForgeResult<AppBundleDetail> {
        self.get(&format!("/appbundles/{}", enc(bundle_id))).await
    }

    /// Gets a specific version of an app bundle.
    pub async fn get_app_bundle_version(&self, name: &str, version: u32) -> ForgeResult<AppBundleDetail> {
        self.versioned(Collection::AppBundles, name, version).await
    }

    /// Registers a new app bundle. The response carries the package upload target.
    pub async fn create_app_bundle(&self, name: &str, engine: &str, description: &str) -> ForgeResult<AppBundleDetail> {
        debug!(name = %name, engine = %engine, "Creating app bundle");
        let path = format!("{}/appbundles", ROOT_PATH);
        self.send_json(
            RequestSpec::post(path),
            &json!({ "id": name, "description": description, "engine": engine }),
        )
        .await
    }

    /// Creates a new version of an app bundle.
    pub async fn update_app_bundle(
        &self,
        name: &str,
        engine: Option<&str>,
        description: Option<&str>,
    ) -> ForgeResult<AppBundleDetail> {
        let mut body = serde_json::Map::new();
        if let Some(description) = description {
            body.insert("description".to_string(), json!(description));
        }
        if let Some(engine) = engine {
            body.insert("engine".to_string(), json!(engine));
        }
        let path = format!("{}/appbundles/{}/versions", ROOT_PATH, enc(name));
        self.send_json(RequestSpec::post(path), &body).await
    }

    /// Iterates over aliases of an app bundle.
    pub fn iterate_app_bundle_aliases(&self, name: &str) -> PageIterator<Alias> {
        self.pages(&format!("/appbundles/{}/aliases", enc(name)))
    }

    /// Lists all aliases of an app bundle.
    pub async fn list_app_bundle_aliases(&self, name: &str) -> ForgeResult<Vec<Alias>> {
        self.iterate_app_bundle_aliases(name).collect_all().await
    }

    /// Iterates over version numbers of an app bundle.
    pub fn iterate_app_bundle_versions(&self, name: &str) -> PageIterator<u32> {
        self.pages(&format!("/appbundles/{}/versions", enc(name)))
    }

    /// Lists all version numbers of an app bundle.
    pub async fn list_app_bundle_versions(&self, name: &str) -> ForgeResult<Vec<u32>> {
        self.iterate_app_bundle_versions(name).collect_all().await
    }

    /// Creates an alias pointing to a version of an app bundle.
    pub async fn create_app_bundle_alias(&self, name: &str, alias: &str, version: u32) -> ForgeResult<Alias> {
        self.create_alias(Collection::AppBundles, name, alias, version).await
    }

    /// Points an existing app bundle alias to another version.
    pub async fn update_app_bundle_alias(&self, name: &str, alias: &str, version: u32) -> ForgeResult<Alias> {
        self.update_alias(Collection::AppBundles, name, alias, version).await
    }

    /// Deletes an app bundle with all its versions and aliases.
    pub async fn delete_app_bundle(&self, name: &str) -> ForgeResult<()> {
        self.delete(&format!("/appbundles/{}", enc(name))).await
    }

    /// Deletes an app bundle alias.
    pub async fn delete_app_bundle_alias(&self, name: &str, alias: &str) -> ForgeResult<()> {
        self.delete(&format!("/appbundles/{}/aliases/{}", enc(name), enc(alias))).await
    }

    /// Deletes an app bundle version.
    pub async fn delete_app_bundle_version(&self, name: &str, version: u32) -> ForgeResult<()> {
        self.delete(&format!("/appbundles/{}/versions/{}", enc(name), version)).await
    }

    // Activities

    /// Iterates over activity ids.
    pub fn iterate_activities(&self) -> PageIterator<String> {
        self.pages("/activities")
    }

    /// Lists all activity ids.
    pub async fn list_activities(&self) -> ForgeResult<Vec<String>> {
        self.iterate_activities().collect_all().await
    }

    /// Gets activity details by short or fully qualified id.
    pub async fn get_activity(&self, activity_id: &str) -> ForgeResult<ActivityDetail> {
        self.get(&format!("/activities/{}", enc(activity_id))).await
    }

    /// Gets a specific version of an activity.
    pub async fn get_activity_version(&self, name: &str, version: u32) -> ForgeResult<ActivityDetail> {
        self.versioned(Collection::Activities, name, version).await
    }

    /// Creates an activity running one app bundle owned by this client.
    ///
    /// Requires client credentials: the client id qualifies the app bundle id.
    pub async fn create_activity(&self, id: &str, request: &ActivityRequest) -> ForgeResult<ActivityDetail> {
        let config = build_activity_config(Some(id), &self.owner()?, request)?;
        debug!(id = %id, engine = %request.engine, "Creating activity");
        let path = format!("{}/activities", ROOT_PATH);
        self.send_json(RequestSpec::post(path), &config).await
    }

    /// Creates a new version of an activity.
    pub async fn update_activity(&self, id: &str, request: &ActivityRequest) -> ForgeResult<ActivityDetail> {
        let config = build_activity_config(None, &self.owner()?, request)?;
        let path = format!("{}/activities/{}/versions", ROOT_PATH, enc(id));
        self.send_json(RequestSpec::post(path), &config).await
    }

    /// Iterates over aliases of an activity.
    pub fn iterate_activity_aliases(&self, name: &str) -> PageIterator<Alias> {
        self.pages(&format!("/activities/{}/aliases", enc(name)))
    }

    /// Lists all aliases of an activity.
    pub async fn list_activity_aliases(&self, name: &str) -> ForgeResult<Vec<Alias>> {
        self.iterate_activity_aliases(name).collect_all().await
    }

    /// Iterates over version numbers of an activity.
    pub fn iterate_activity_versions(&self, name: &str) -> PageIterator<u32> {
        self.pages(&format!("/activities/{}/versions", enc(name)))
    }

    /// Lists all version numbers of an activity.
    pub async fn list_activity_versions(&self, name: &str) -> ForgeResult<Vec<u32>> {
        self.iterate_activity_versions(name).collect_all().await
    }

    /// Creates an alias pointing to a version of an activity.
    pub async fn create_activity_alias(&self, name: &str, alias: &str, version: u32) -> ForgeResult<Alias> {
        self.create_alias(Collection::Activities, name, alias, version).await
    }

    /// Points an existing activity alias to another version.
    pub async fn update_activity_alias(&self, name: &str, alias: &str, version: u32) -> ForgeResult<Alias> {
        self.update_alias(Collection::Activities, name, alias, version).await
    }

    /// Deletes an activity with all its versions and aliases.
    pub async fn delete_activity(&self, name: &str) -> ForgeResult<()> {
        self.delete(&format!("/activities/{}", enc(name))).await
    }

    /// Deletes an activity alias.
    pub async fn delete_activity_alias(&self, name: &str, alias: &str) -> ForgeResult<()> {
        self.delete(&format!("/activities/{}/aliases/{}", enc(name), enc(alias))).await
    }

    /// Deletes an activity version.
    pub async fn delete_activity_version(&self, name: &str, version: u32) -> ForgeResult<()> {
        self.delete(&format!("/activities/{}/versions/{}", enc(name), version)).await
    }

    // Work items

    /// Gets the status of a work item.
    pub async fn get_work_item(&self, id: &str) -> ForgeResult<WorkItemStatus> {
        self.get(&format!("/workitems/{}", enc(id))).await
    }

    /// Starts a work item for a fully qualified activity id.
    pub async fn create_work_item(
        &self,
        activity_id: &str,
        inputs: &[WorkItemParam],
        outputs: &[WorkItemParam],
    ) -> ForgeResult<WorkItemStatus> {
        let mut arguments = BTreeMap::new();
        for input in inputs {
            arguments.insert(input.name.clone(), WorkItemArgument::from_param(input, "get"));
        }
        for output in outputs {
            arguments.insert(output.name.clone(), WorkItemArgument::from_param(output, "put"));
        }

        debug!(activity = %activity_id, "Creating work item");
        let path = format!("{}/workitems", ROOT_PATH);
        self.send_json(
            RequestSpec::post(path),
            &json!({ "activityId": activity_id, "arguments": arguments }),
        )
        .await
    }

    /// Cancels and deletes a work item.
    pub async fn delete_work_item(&self, id: &str) -> ForgeResult<()> {
        self.delete(&format!("/workitems/{}", enc(id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::config::ForgeConfig;
    use crate::mocks::{ManualClock, MockResponse, MockTransport};
    use serde_json::Value;

    fn service(transport: Arc<MockTransport>, credentials: Credentials) -> DesignAutomationService {
        let config = ForgeConfig::builder()
            .credentials(credentials)
            .host("https://forge.example.com")
            .build()
            .unwrap();
        let executor = RequestExecutor::new(&config, transport, Arc::new(ManualClock::new())).unwrap();
        DesignAutomationService::new(Arc::new(executor))
    }

    fn request(engine: &str) -> ActivityRequest {
        let mut input = ActivityParam::new("input");
        input.local_name = Some("input.dwg".to_string());
        ActivityRequest {
            engine: engine.to_string(),
            bundle_name: "MyBundle".to_string(),
            bundle_alias: "prod".to_string(),
            description: "Test".to_string(),
            inputs: vec![input],
            outputs: vec![ActivityParam::new("output")],
            script: Some("_.quit".to_string()),
        }
    }

    #[test]
    fn test_id_parse_and_display() {
        let id = DesignAutomationId::parse("Autodesk.AutoCAD+23_1").unwrap();
        assert_eq!(id, DesignAutomationId::new("Autodesk", "AutoCAD", "23_1"));
        assert_eq!(id.to_string(), "Autodesk.AutoCAD+23_1");

        assert_eq!(DesignAutomationId::parse("me.Bundle+$LATEST").unwrap().alias, "$LATEST");
        assert!(DesignAutomationId::parse("Autodesk.AutoCAD").is_none());
        assert!(DesignAutomationId::parse("a.b.c+d").is_none());
        assert!(DesignAutomationId::parse("a.b+c-d").is_none());
        assert!("nope".parse::<DesignAutomationId>().is_err());
    }

    #[test]
    fn test_autocad_config() {
        let config = build_activity_config(Some("MyActivity"), "client", &request("Autodesk.AutoCAD+23")).unwrap();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "MyActivity",
                "commandLine": ["$(engine.path)\\accoreconsole.exe /al $(appbundles[MyBundle].path) /i $(args[input].path) /s $(settings[script].path)"],
                "parameters": {
                    "input": {"verb": "get", "localName": "input.dwg"},
                    "output": {"verb": "put"}
                },
                "description": "Test",
                "engine": "Autodesk.AutoCAD+23",
                "appbundles": ["client.MyBundle+prod"],
                "settings": {"script": "_.quit"}
            })
        );
    }

    #[test]
    fn test_3dsmax_config() {
        let config = build_activity_config(None, "client", &request("Autodesk.3dsMax+2021")).unwrap();
        assert_eq!(config.id, None);
        assert_eq!(
            config.command_line,
            CommandLine::Single(
                "$(engine.path)\\3dsmaxbatch.exe -sceneFile \"$(args[input].path)\" \"$(settings[script].path)\"".to_string()
            )
        );

        let mut two_inputs = request("Autodesk.3dsMax+2021");
        two_inputs.inputs.push(ActivityParam::new("second"));
        assert!(build_activity_config(None, "client", &two_inputs).is_err());
    }

    #[test]
    fn test_revit_and_inventor_ignore_script() {
        let revit = build_activity_config(None, "c", &request("Autodesk.Revit+2021")).unwrap();
        assert_eq!(
            revit.command_line,
            CommandLine::Multiple(vec![
                "$(engine.path)\\revitcoreconsole.exe /al $(appbundles[MyBundle].path) /i $(args[input].path)".to_string()
            ])
        );
        assert!(revit.settings.is_none());

        let inventor = build_activity_config(None, "c", &request("Autodesk.Inventor+2021")).unwrap();
        match inventor.command_line {
            CommandLine::Multiple(lines) => assert!(lines[0].starts_with("$(engine.path)\\InventorCoreConsole.exe")),
            other => panic!("unexpected command line: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_engine() {
        tokio_test::assert_err!(build_activity_config(None, "c", &request("Autodesk.Maya+2020")));
        tokio_test::assert_err!(build_activity_config(None, "c", &request("not-an-engine")));
        tokio_test::assert_ok!(EngineKind::from_engine("Autodesk.Inventor+2021"));
    }

    #[tokio::test]
    async fn test_create_activity_requires_client_id() {
        let transport = Arc::new(MockTransport::new());
        let service = service(transport.clone(), Credentials::token("t"));

        let err = service
            .create_activity("MyActivity", &request("Autodesk.AutoCAD+23"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForgeError::Authentication(AuthenticationError::ClientCredentialsRequired(_))
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_list_engines_follows_pagination_token() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::json(200, json!({"data": ["Autodesk.AutoCAD+23"], "paginationToken": "abc"})),
            MockResponse::json(200, json!({"data": ["Autodesk.Revit+2021"]})),
        ]));
        let service = service(transport.clone(), Credentials::token("t"));

        let engines = service.list_engines().await.unwrap();
        assert_eq!(engines, vec!["Autodesk.AutoCAD+23", "Autodesk.Revit+2021"]);
        assert_eq!(
            transport.last_request().unwrap().url.as_str(),
            "https://forge.example.com/da/us-east/v3/engines?page=abc"
        );
    }

    #[tokio::test]
    async fn test_alias_update_uses_patch() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::json(
            200,
            json!({"id": "prod", "version": 3}),
        )]));
        let service = service(transport.clone(), Credentials::token("t"));

        let alias = service.update_app_bundle_alias("MyBundle", "prod", 3).await.unwrap();
        assert_eq!(alias.version, 3);

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, crate::transport::HttpMethod::Patch);
        assert_eq!(request.url.path(), "/da/us-east/v3/appbundles/MyBundle/aliases/prod");
        let body: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"version": 3}));
    }

    #[tokio::test]
    async fn test_create_work_item_arguments() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::json(
            200,
            json!({"id": "w1", "status": "pending"}),
        )]));
        let service = service(transport.clone(), Credentials::token("t"));

        let mut output = WorkItemParam::new("output", "https://out");
        output.optional = Some(true);
        let status = service
            .create_work_item("me.Act+prod", &[WorkItemParam::new("input", "https://in")], &[output])
            .await
            .unwrap();
        assert_eq!(status.status, "pending");

        let body: Value = serde_json::from_slice(transport.last_request().unwrap().body.as_ref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "activityId": "me.Act+prod",
                "arguments": {
                    "input": {"verb": "get", "url": "https://in"},
                    "output": {"verb": "put", "url": "https://out", "optional": true}
                }
            })
        );
    }
}
