use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Celebrities::Table)
                    .if_not_exists()
                    .col(pk_uuid(Celebrities::Id))
                    .col(string(Celebrities::Name))
                    .col(string_null(Celebrities::ImageUrl))
                    .col(string_null(Celebrities::KnownFor))
                    .col(string_null(Celebrities::Nationality))
                    .col(text_null(Celebrities::Bio))
                    .col(string_null(Celebrities::BirthDate))
                    .col(string_null(Celebrities::BirthPlace))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_celebrities_name")
                    .table(Celebrities::Table)
                    .col(Celebrities::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Films::Table)
                    .if_not_exists()
                    .col(pk_uuid(Films::Id))
                    .col(string(Films::Title))
                    .col(string_null(Films::PosterUrl))
                    .col(integer_null(Films::ReleaseYear))
                    .col(string_null(Films::Genre))
                    .col(string_null(Films::Director))
                    .col(double_null(Films::Rating))
                    .col(integer_null(Films::DurationMinutes))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_films_rating")
                    .table(Films::Table)
                    .col(Films::Rating)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FilmCast::Table)
                    .if_not_exists()
                    .col(pk_uuid(FilmCast::Id))
                    .col(uuid(FilmCast::FilmId))
                    .col(uuid(FilmCast::CelebrityId))
                    .col(string_null(FilmCast::RoleName))
                    .col(boolean(FilmCast::IsLead).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_film_cast_film")
                            .from(FilmCast::Table, FilmCast::FilmId)
                            .to(Films::Table, Films::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_film_cast_celebrity")
                            .from(FilmCast::Table, FilmCast::CelebrityId)
                            .to(Celebrities::Table, Celebrities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_film_cast_unique")
                    .table(FilmCast::Table)
                    .col(FilmCast::FilmId)
                    .col(FilmCast::CelebrityId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_film_cast_celebrity")
                    .table(FilmCast::Table)
                    .col(FilmCast::CelebrityId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(FilmCast::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Films::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Celebrities::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Celebrities {
    Table,
    Id,
    Name,
    ImageUrl,
    KnownFor,
    Nationality,
    Bio,
    BirthDate,
    BirthPlace,
}

#[derive(DeriveIden)]
pub(crate) enum Films {
    Table,
    Id,
    Title,
    PosterUrl,
    ReleaseYear,
    Genre,
    Director,
    Rating,
    DurationMinutes,
}

#[derive(DeriveIden)]
enum FilmCast {
    Table,
    Id,
    FilmId,
    CelebrityId,
    RoleName,
    IsLead,
}
