//! `hash{Md5,Sha1,Sha256}{File,Text,Buffer}` builtins.

use banai_crypto::{HashAlgorithm, hash_bytes, hash_file};
use serde_json::Value;

use crate::error::ToolResult;
use crate::{Args, BuiltinTool, ScriptContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    File,
    Text,
    Buffer,
}

/// One hashing builtin: an algorithm applied to one kind of input.
#[derive(Debug, Clone, Copy)]
pub struct HashTool {
    name: &'static str,
    algorithm: HashAlgorithm,
    input: Input,
}

impl HashTool {
    /// All nine builtins.
    #[must_use]
    pub fn all() -> Vec<Self> {
        use HashAlgorithm::{Md5, Sha1, Sha256};
        use Input::{Buffer, File, Text};
        [
            ("hashMd5File", Md5, File),
            ("hashMd5Text", Md5, Text),
            ("hashMd5Buffer", Md5, Buffer),
            ("hashSha1File", Sha1, File),
            ("hashSha1Text", Sha1, Text),
            ("hashSha1Buffer", Sha1, Buffer),
            ("hashSha256File", Sha256, File),
            ("hashSha256Text", Sha256, Text),
            ("hashSha256Buffer", Sha256, Buffer),
        ]
        .into_iter()
        .map(|(name, algorithm, input)| Self {
            name,
            algorithm,
            input,
        })
        .collect()
    }
}

#[async_trait::async_trait]
impl BuiltinTool for HashTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        match self.input {
            Input::File => "Hex digest of a file, streamed in chunks.",
            Input::Text => "Hex digest of the UTF-8 bytes of a string.",
            Input::Buffer => "Hex digest of an array of byte values.",
        }
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let digest = match self.input {
            Input::Text => {
                let text: String = args.required(0, "text")?;
                hash_bytes(self.algorithm, text.as_bytes())
            },
            Input::Buffer => {
                let bytes: Vec<u8> = args.required(0, "buffer")?;
                hash_bytes(self.algorithm, &bytes)
            },
            Input::File => {
                let path = ctx.resolve(&args.string(0, "path")?).await;
                let algorithm = self.algorithm;
                crate::blocking(move || Ok(hash_file(algorithm, &path)?)).await?
            },
        };
        Ok(Value::String(digest.to_hex()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::testing::{args, ctx};
    use serde_json::json;

    fn tool(name: &str) -> HashTool {
        HashTool::all().into_iter().find(|t| t.name == name).unwrap()
    }

    #[tokio::test]
    async fn test_text_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        for (name, want) in [
            ("hashMd5Text", "562357d95918fbcb430b27bdca4d0677"),
            ("hashSha1Text", "d9707a4c860e3be64fb99aa5f2830b0d126844f9"),
            (
                "hashSha256Text",
                "3b065a37be3ce1e7a03fce4bddbe426d9308e9861f872a552813d0ea0a87af3d",
            ),
        ] {
            let v = tool(name)
                .execute(args(vec![json!("line123")]), &ctx)
                .await
                .unwrap();
            assert_eq!(v, json!(want), "{name}");
        }
    }

    #[tokio::test]
    async fn test_file_matches_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "line123").unwrap();
        let ctx = ctx(dir.path());
        let v = tool("hashSha1File")
            .execute(args(vec![json!("f.txt")]), &ctx)
            .await
            .unwrap();
        assert_eq!(v, json!("d9707a4c860e3be64fb99aa5f2830b0d126844f9"));
    }

    #[tokio::test]
    async fn test_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let bytes: Vec<u8> = b"line123".to_vec();
        let v = tool("hashMd5Buffer")
            .execute(args(vec![json!(bytes)]), &ctx)
            .await
            .unwrap();
        assert_eq!(v, json!("562357d95918fbcb430b27bdca4d0677"));
    }

    #[tokio::test]
    async fn test_missing_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        let ctx = ctx(dir.path());
        let err = tool("hashSha256File")
            .execute(args(vec![json!("nope")]), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = tool("hashSha256File")
            .execute(args(vec![json!("d")]), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
