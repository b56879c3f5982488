use clap::Args;

use super::PeerOpError;

#[derive(Args, Debug, Clone)]
pub struct List;

#[async_trait::async_trait]
impl crate::op::Op for List {
    type Error = PeerOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (_, session) = ctx.login()?;
        let peers = session.peers.load();

        if peers.is_empty() {
            return Ok("No trusted peers".to_string());
        }

        let output = peers
            .iter()
            .map(|(alias, record)| {
                let mut line = format!("{}: {}", alias, record.network_id);
                if !record.permissions.projects.is_empty() {
                    line.push_str(&format!(" projects={}", record.permissions.projects.join(",")));
                }
                if !record.permissions.inventory.is_empty() {
                    line.push_str(&format!(
                        " inventory={}",
                        record.permissions.inventory.join(",")
                    ));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output)
    }
}
