use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .col(ColumnDef::new(User::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(User::Username).string().not_null())
                    .col(ColumnDef::new(User::Email).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_user_username")
                    .table(User::Table)
                    .col(User::Username)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vendor::Table)
                    .col(ColumnDef::new(Vendor::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Vendor::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_vendor_name")
                    .table(Vendor::Table)
                    .col(Vendor::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Product::Table)
                    .col(ColumnDef::new(Product::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Product::VendorId).uuid().not_null())
                    .col(ColumnDef::new(Product::Name).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Product::Table, Product::VendorId)
                            .to(Vendor::Table, Vendor::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_product_vendorid_name")
                    .table(Product::Table)
                    .col(Product::VendorId)
                    .col(Product::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VendorSubscription::Table)
                    .col(ColumnDef::new(VendorSubscription::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(VendorSubscription::VendorId)
                            .uuid()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(VendorSubscription::UserId)
                            .col(VendorSubscription::VendorId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(VendorSubscription::Table, VendorSubscription::UserId)
                            .to(User::Table, User::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(VendorSubscription::Table, VendorSubscription::VendorId)
                            .to(Vendor::Table, Vendor::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProductSubscription::Table)
                    .col(
                        ColumnDef::new(ProductSubscription::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductSubscription::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ProductSubscription::UserId)
                            .col(ProductSubscription::ProductId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ProductSubscription::Table, ProductSubscription::UserId)
                            .to(User::Table, User::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ProductSubscription::Table, ProductSubscription::ProductId)
                            .to(Product::Table, Product::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Cve::Table)
                    .col(ColumnDef::new(Cve::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Cve::CveId).string().not_null())
                    .col(ColumnDef::new(Cve::Summary).string().not_null())
                    .col(ColumnDef::new(Cve::Cvss2).double())
                    .col(ColumnDef::new(Cve::Cvss3).double())
                    .col(ColumnDef::new(Cve::Vendors).json_binary().not_null())
                    .col(ColumnDef::new(Cve::Cwes).json_binary().not_null())
                    .col(
                        ColumnDef::new(Cve::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_cve_cveid")
                    .table(Cve::Table)
                    .col(Cve::CveId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Change::Table)
                    .col(ColumnDef::new(Change::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Change::CveId).uuid().not_null())
                    .col(
                        ColumnDef::new(Change::Reviewed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Change::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Change::Table, Change::CveId)
                            .to(Cve::Table, Cve::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_change_reviewed")
                    .table(Change::Table)
                    .col(Change::Reviewed)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Event::Table)
                    .col(ColumnDef::new(Event::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Event::CveId).uuid().not_null())
                    .col(ColumnDef::new(Event::ChangeId).uuid().not_null())
                    .col(ColumnDef::new(Event::Kind).string().not_null())
                    .col(ColumnDef::new(Event::Details).json_binary().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Event::Table, Event::CveId)
                            .to(Cve::Table, Cve::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Event::Table, Event::ChangeId)
                            .to(Change::Table, Change::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Report::Table)
                    .col(ColumnDef::new(Report::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Report::UserId).uuid().not_null())
                    .col(ColumnDef::new(Report::Day).date().not_null())
                    .col(ColumnDef::new(Report::PublicLink).string().not_null())
                    .col(
                        ColumnDef::new(Report::Seen)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Report::Details).json_binary().not_null())
                    .col(
                        ColumnDef::new(Report::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Report::Table, Report::UserId)
                            .to(User::Table, User::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_report_userid_day")
                    .table(Report::Table)
                    .col(Report::UserId)
                    .col(Report::Day)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReportChange::Table)
                    .col(ColumnDef::new(ReportChange::ReportId).uuid().not_null())
                    .col(ColumnDef::new(ReportChange::ChangeId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(ReportChange::ReportId)
                            .col(ReportChange::ChangeId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ReportChange::Table, ReportChange::ReportId)
                            .to(Report::Table, Report::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ReportChange::Table, ReportChange::ChangeId)
                            .to(Change::Table, Change::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Integration::Table)
                    .col(
                        ColumnDef::new(Integration::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Integration::UserId).uuid().not_null())
                    .col(ColumnDef::new(Integration::Name).string().not_null())
                    .col(ColumnDef::new(Integration::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Integration::Configuration)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Integration::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Integration::Report)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Integration::AlertFilters)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Integration::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Integration::Table, Integration::UserId)
                            .to(User::Table, User::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_integration_userid_name")
                    .table(Integration::Table)
                    .col(Integration::UserId)
                    .col(Integration::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Integration::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReportChange::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Report::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Event::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Change::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Cve::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProductSubscription::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VendorSubscription::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Product::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vendor::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
    Username,
    Email,
}

#[derive(DeriveIden)]
enum Vendor {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Product {
    Table,
    Id,
    VendorId,
    Name,
}

#[derive(DeriveIden)]
enum VendorSubscription {
    Table,
    UserId,
    VendorId,
}

#[derive(DeriveIden)]
enum ProductSubscription {
    Table,
    UserId,
    ProductId,
}

#[derive(DeriveIden)]
enum Cve {
    Table,
    Id,
    CveId,
    Summary,
    Cvss2,
    Cvss3,
    Vendors,
    Cwes,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Change {
    Table,
    Id,
    CveId,
    Reviewed,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Event {
    Table,
    Id,
    CveId,
    ChangeId,
    Kind,
    Details,
}

#[derive(DeriveIden)]
enum Report {
    Table,
    Id,
    UserId,
    Day,
    PublicLink,
    Seen,
    Details,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ReportChange {
    Table,
    ReportId,
    ChangeId,
}

#[derive(DeriveIden)]
enum Integration {
    Table,
    Id,
    UserId,
    Name,
    Kind,
    Configuration,
    Enabled,
    Report,
    AlertFilters,
    CreatedAt,
}
