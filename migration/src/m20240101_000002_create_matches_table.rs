use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Matches::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Matches::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Matches::WinnerId).uuid().null())
                    .col(ColumnDef::new(Matches::LoserId).uuid().null())
                    .col(
                        ColumnDef::new(Matches::WinnerEloBefore)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Matches::WinnerEloAfter).integer().not_null())
                    .col(ColumnDef::new(Matches::LoserEloBefore).integer().not_null())
                    .col(ColumnDef::new(Matches::LoserEloAfter).integer().not_null())
                    .col(
                        ColumnDef::new(Matches::TargetWord)
                            .string_len(5)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Matches::ReplayLog).json().not_null())
                    .col(ColumnDef::new(Matches::DurationMs).big_integer().not_null())
                    .col(
                        ColumnDef::new(Matches::IsBotMatch)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Matches::BotDifficulty).string().null())
                    .col(
                        ColumnDef::new(Matches::PlayedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Per-player match history lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_matches_winner_id")
                    .table(Matches::Table)
                    .col(Matches::WinnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_matches_loser_id")
                    .table(Matches::Table)
                    .col(Matches::LoserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_matches_played_at")
                    .table(Matches::Table)
                    .col(Matches::PlayedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Matches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Matches {
    Table,
    Id,
    WinnerId,
    LoserId,
    WinnerEloBefore,
    WinnerEloAfter,
    LoserEloBefore,
    LoserEloAfter,
    TargetWord,
    ReplayLog,
    DurationMs,
    IsBotMatch,
    BotDifficulty,
    PlayedAt,
}
