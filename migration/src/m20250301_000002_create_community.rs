use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250301_000001_create_catalog::{Celebrities, Films};

const ONE_TARGET: &str = "(celebrity_id IS NULL) <> (film_id IS NULL)";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Favorites::Table)
                    .if_not_exists()
                    .col(pk_uuid(Favorites::Id))
                    .col(uuid(Favorites::UserId))
                    .col(uuid_null(Favorites::CelebrityId))
                    .col(uuid_null(Favorites::FilmId))
                    .col(big_integer(Favorites::CreatedAt))
                    .check(Expr::cust(ONE_TARGET))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favorites_celebrity")
                            .from(Favorites::Table, Favorites::CelebrityId)
                            .to(Celebrities::Table, Celebrities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favorites_film")
                            .from(Favorites::Table, Favorites::FilmId)
                            .to(Films::Table, Films::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_favorites_user")
                    .table(Favorites::Table)
                    .col(Favorites::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(pk_uuid(Comments::Id))
                    .col(uuid(Comments::UserId))
                    .col(text(Comments::Content))
                    .col(uuid_null(Comments::CelebrityId))
                    .col(uuid_null(Comments::FilmId))
                    .col(big_integer(Comments::CreatedAt))
                    .check(Expr::cust(ONE_TARGET))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_celebrity")
                            .from(Comments::Table, Comments::CelebrityId)
                            .to(Celebrities::Table, Celebrities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_film")
                            .from(Comments::Table, Comments::FilmId)
                            .to(Films::Table, Films::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_created_at")
                    .table(Comments::Table)
                    .col(Comments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Profiles::Table)
                    .if_not_exists()
                    .col(uuid(Profiles::UserId).primary_key())
                    .col(string_null(Profiles::Username))
                    .col(string_null(Profiles::FullName))
                    .col(string_null(Profiles::AvatarUrl))
                    .col(text_null(Profiles::Bio))
                    .col(string_null(Profiles::FavoriteGenre))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Profiles::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Comments::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Favorites::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Favorites {
    Table,
    Id,
    UserId,
    CelebrityId,
    FilmId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    UserId,
    Content,
    CelebrityId,
    FilmId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    UserId,
    Username,
    FullName,
    AvatarUrl,
    Bio,
    FavoriteGenre,
}
