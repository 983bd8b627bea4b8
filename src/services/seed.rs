//! Demo data for fresh installations

use super::Services;
use crate::{
    error::AppResult,
    models::{equipment::NewEquipment, user::Role},
};

const ACCOUNTS: [(&str, &str, Role, &str); 3] = [
    ("ram", "ram@123", Role::Student, "Sai Ram"),
    ("suresh", "suresh@123", Role::Staff, "Suresh Babu"),
    ("prakash", "prakash@123", Role::Admin, "Prakash Raj"),
];

const EQUIPMENT: [(&str, &str, &str, i32); 4] = [
    ("Canon EOS 80D", "Camera", "Needs strap replacement", 5),
    ("Basketball Kit", "Sports", "Used but intact", 20),
    ("Chemistry Lab Set", "Lab", "Glassware missing 2 test tubes", 10),
    ("Acoustic Guitar", "Music", "Strings replaced recently", 3),
];

/// Insert demo accounts and equipment into empty stores.
///
/// Equipment starts fully available: no request holds any unit yet.
pub async fn seed_if_empty(services: &Services) -> AppResult<()> {
    if services.users.count().await? == 0 {
        for (username, password, role, display_name) in ACCOUNTS {
            services
                .users
                .create_account(username, password, role, display_name)
                .await?;
        }
        tracing::info!("Seeded {} accounts", ACCOUNTS.len());
    }

    if services.equipment.count().await? == 0 {
        for (name, category, note, total) in EQUIPMENT {
            services
                .repository
                .equipment
                .create(NewEquipment {
                    name: name.to_string(),
                    category: Some(category.to_string()),
                    condition_note: Some(note.to_string()),
                    total_quantity: total,
                    available_quantity: total,
                })
                .await?;
        }
        tracing::info!("Seeded {} equipment rows", EQUIPMENT.len());
    }

    Ok(())
}
