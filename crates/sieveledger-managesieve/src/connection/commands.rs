//! Typed ManageSieve commands on an authenticated session.

use tracing::debug;

use super::Session;
use super::stream::Transport;
use crate::command::{Command, validate_script_name};
use crate::parser::unquote;
use crate::types::{Capabilities, ResponseCode, ScriptListing};
use crate::{Error, Result};

impl<S: Transport> Session<S> {
    /// Re-reads the server capabilities.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` if the server answers NO.
    pub async fn capability(&mut self) -> Result<Capabilities> {
        let response = self.run(&Command::Capability).await?.into_result()?;
        let capabilities = Capabilities::parse(&response.lines);
        self.set_capabilities(capabilities.clone());
        Ok(capabilities)
    }

    /// Asks whether a script of `size` bytes named `name` would fit.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` with a `QUOTA` code if it would not.
    pub async fn have_space(&mut self, name: &str, size: u64) -> Result<()> {
        validate_script_name(name)?;
        self.run(&Command::HaveSpace {
            name: name.to_string(),
            size,
        })
        .await?
        .into_result()?;
        Ok(())
    }

    /// Uploads a script, replacing any script with the same name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a bad name and `CommandRejected` if
    /// the server refuses the script.
    pub async fn put_script(&mut self, name: &str, script: &[u8]) -> Result<()> {
        validate_script_name(name)?;
        debug!(script = %name, size = script.len(), "Uploading script");
        self.run(&Command::PutScript {
            name: name.to_string(),
            script: script.to_vec(),
        })
        .await?
        .into_result()?;
        Ok(())
    }

    /// Lists the scripts stored for this account.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if more than one script is marked active.
    pub async fn list_scripts(&mut self) -> Result<ScriptListing> {
        let response = self.run(&Command::ListScripts).await?.into_result()?;
        ScriptListing::parse(&response.lines)
    }

    /// Makes `name` the active script.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` if the script does not exist.
    pub async fn set_active(&mut self, name: &str) -> Result<()> {
        validate_script_name(name)?;
        self.activate(name).await
    }

    /// Deactivates whichever script is active.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` if the server refuses.
    pub async fn deactivate(&mut self) -> Result<()> {
        self.activate("").await
    }

    async fn activate(&mut self, name: &str) -> Result<()> {
        self.run(&Command::SetActive {
            name: name.to_string(),
        })
        .await?
        .into_result()?;
        Ok(())
    }

    /// Downloads a script.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` with a `NONEXISTENT` code if there is no
    /// such script.
    pub async fn get_script(&mut self, name: &str) -> Result<Vec<u8>> {
        validate_script_name(name)?;
        let response = self
            .run(&Command::GetScript {
                name: name.to_string(),
            })
            .await?
            .into_result()?;

        if let Some(script) = response.literals.into_iter().next() {
            return Ok(script);
        }
        if response.lines.is_empty() {
            return Err(Error::ProtocolViolation(format!(
                "GETSCRIPT {name} returned no script"
            )));
        }
        Ok(unquote(&response.lines.join("\n")).into_bytes())
    }

    /// Deletes a script. The active script cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` with an `ACTIVE` or `NONEXISTENT` code.
    pub async fn delete_script(&mut self, name: &str) -> Result<()> {
        validate_script_name(name)?;
        self.run(&Command::DeleteScript {
            name: name.to_string(),
        })
        .await?
        .into_result()?;
        Ok(())
    }

    /// Renames a script.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` with an `ALREADYEXISTS` or `NONEXISTENT` code.
    pub async fn rename_script(&mut self, from: &str, to: &str) -> Result<()> {
        validate_script_name(from)?;
        validate_script_name(to)?;
        self.run(&Command::RenameScript {
            from: from.to_string(),
            to: to.to_string(),
        })
        .await?
        .into_result()?;
        Ok(())
    }

    /// Validates a script without storing it.
    ///
    /// Returns the server's warnings when the script is valid but carries
    /// a `WARNINGS` code.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` with the compile error if the script is invalid.
    pub async fn check_script(&mut self, script: &[u8]) -> Result<Option<String>> {
        let response = self
            .run(&Command::CheckScript {
                script: script.to_vec(),
            })
            .await?
            .into_result()?;

        Ok(match response.status.code() {
            Some(ResponseCode::Warnings) => Some(response.status.text()),
            _ => None,
        })
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns `CommandRejected` if the server answers NO.
    pub async fn noop(&mut self) -> Result<()> {
        self.run(&Command::Noop).await?.into_result()?;
        Ok(())
    }
}
