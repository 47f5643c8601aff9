use colored::*;
use tilt::PeerId;
use tilt::model::FinalPlayerData;
use tilt::session::{GameScene, PlayerInfo, SessionState};

/// A user-facing change between two published snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Connected,
    Disconnected,
    Fault(String),
    HostChanged { host: PeerId, is_local: bool },
    Joined(PlayerInfo),
    Left(PlayerInfo),
    Assigned { group: Option<String>, color: Option<String> },
    Scene(GameScene),
    Instruction { step: String, message: String },
    Standings(Vec<FinalPlayerData>),
}

pub fn changes(prev: &SessionState, next: &SessionState) -> Vec<Notice> {
    let mut out = Vec::new();

    if next.connected != prev.connected {
        out.push(if next.connected {
            Notice::Connected
        } else {
            Notice::Disconnected
        });
    }
    if let Some(fault) = &next.fault
        && prev.fault.as_ref() != Some(fault)
    {
        out.push(Notice::Fault(fault.to_string()));
    }
    if let Some(host) = &next.host_id
        && prev.host_id.as_ref() != Some(host)
    {
        out.push(Notice::HostChanged {
            host: host.clone(),
            is_local: next.is_host,
        });
    }

    for player in &next.other_players {
        if prev.player(&player.id) != Some(player) {
            out.push(Notice::Joined(player.clone()));
        }
    }
    for player in &prev.other_players {
        if next.player(&player.id).is_none() {
            out.push(Notice::Left(player.clone()));
        }
    }

    let (was, now) = (&prev.local_player, &next.local_player);
    if (was.group.as_ref(), was.color.as_ref()) != (now.group.as_ref(), now.color.as_ref()) {
        out.push(Notice::Assigned {
            group: now.group.clone(),
            color: now.color.clone(),
        });
    }

    if next.game_scene != prev.game_scene {
        out.push(Notice::Scene(next.game_scene));
        if next.game_scene == GameScene::Awards {
            out.push(Notice::Standings(next.final_results.clone()));
        }
    }
    if let Some(prompt) = &next.tutorial
        && prev.tutorial.as_ref() != Some(prompt)
    {
        out.push(Notice::Instruction {
            step: prompt.step.clone(),
            message: prompt.message.clone(),
        });
    }

    out
}

impl Notice {
    pub fn render(&self) -> String {
        match self {
            Notice::Connected => format!("{}", "🔗 Connected to relay".green().bold()),
            Notice::Disconnected => format!("{}", "🔌 Relay connection closed".yellow()),
            Notice::Fault(detail) => format!("{} {}", "✖ Session fault:".red().bold(), detail),
            Notice::HostChanged { host, is_local } => {
                if *is_local {
                    format!("{}", "👑 You are the host".magenta().bold())
                } else {
                    format!("👑 Host is now {}", host.as_str().magenta())
                }
            }
            Notice::Joined(p) => format!(
                "{} {} ({})",
                "＋".green(),
                p.name.bold(),
                p.avatar.cyan()
            ),
            Notice::Left(p) => format!("{} {}", "－".red(), p.name),
            Notice::Assigned { group, color } => format!(
                "🎨 Assigned group {} color {}",
                group.as_deref().unwrap_or("-").bold(),
                color.as_deref().unwrap_or("-").bold()
            ),
            Notice::Scene(scene) => format!(
                "{} {}",
                "🎬 Scene:".cyan().bold(),
                scene.to_string().to_uppercase()
            ),
            Notice::Instruction { step, message } => {
                format!("📖 [{}] {}", step.yellow(), message)
            }
            Notice::Standings(rows) => {
                let mut lines = vec![format!("{}", "🏆 Final standings".yellow().bold())];
                for row in rows {
                    lines.push(format!(
                        "   #{} {} {} pts ({}, {})",
                        row.rank, row.name.bold(), row.point, row.color, row.skin
                    ));
                }
                lines.join("\n")
            }
        }
    }
}
