//! Secret getters exposed to scripts.
//!
//! Values returned here are handed to the script as-is; the vault still
//! redacts them from every later error message.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::ToolResult;
use crate::{Args, BuiltinTool, ScriptContext};

/// `getTextSecret(id) -> string`
pub struct GetTextSecretTool;

#[async_trait::async_trait]
impl BuiltinTool for GetTextSecretTool {
    fn name(&self) -> &'static str {
        "getTextSecret"
    }

    fn description(&self) -> &'static str {
        "Returns a text secret."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let id = args.string(0, "secretId")?;
        let text = ctx.vault().get_text(&id)?;
        debug!(secret_id = %id, "text secret read");
        Ok(Value::String(text.to_string()))
    }
}

/// `getSSHSecret(id) -> {user, privateKeyFile, passphrase}`
pub struct GetSshSecretTool;

#[async_trait::async_trait]
impl BuiltinTool for GetSshSecretTool {
    fn name(&self) -> &'static str {
        "getSSHSecret"
    }

    fn description(&self) -> &'static str {
        "Returns an SSH secret with the path of its owner-only key file."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let id = args.string(0, "secretId")?;
        let ssh = ctx.vault().get_ssh(&id)?;
        let key_file = ctx.vault().key_file(&id)?;
        debug!(secret_id = %id, "ssh secret read");
        Ok(json!({
            "user": ssh.user,
            "privateKeyFile": key_file.to_string_lossy(),
            "passphrase": ssh.passphrase.as_str(),
        }))
    }
}

/// `getUserPassSecret(id) -> {user, password}`
pub struct GetUserPassSecretTool;

#[async_trait::async_trait]
impl BuiltinTool for GetUserPassSecretTool {
    fn name(&self) -> &'static str {
        "getUserPassSecret"
    }

    fn description(&self) -> &'static str {
        "Returns a username/password secret."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let id = args.string(0, "secretId")?;
        let up = ctx.vault().get_user_pass(&id)?;
        debug!(secret_id = %id, "userpass secret read");
        Ok(json!({
            "user": up.username,
            "password": up.password.as_str(),
        }))
    }
}
